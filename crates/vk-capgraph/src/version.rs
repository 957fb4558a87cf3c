//! Core API version literals, as they appear in `depends`, `promotedto`
//! and `requires` attributes of the registry.

use core::{
    fmt::{self, Display},
    str::FromStr,
};

/// Prefixes under which the registry spells a core version, e.g. `VK_VERSION_1_2`.
///
/// `VK_BASE_VERSION_*`, `VK_COMPUTE_VERSION_*` and `VK_GRAPHICS_VERSION_*`
/// name feature blocks of the same core version.
const VERSION_PREFIXES: [&str; 5] = [
    "VK_VERSION_",
    "VK_API_VERSION_",
    "VK_BASE_VERSION_",
    "VK_COMPUTE_VERSION_",
    "VK_GRAPHICS_VERSION_",
];

/// A `major.minor` core API version.
///
/// Ordering is lexicographic over `(major, minor)`,
/// so `version >= required` is the "is part of core" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
#[expect(clippy::exhaustive_structs, reason = "a version is exactly major and minor")]
pub struct ApiVersion {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
}

impl ApiVersion {
    /// Vulkan 1.0, the version every device supports.
    pub const V1_0: Self = Self::new(1, 0);

    /// Creates a version from its components.
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if `text` is spelled like a version literal,
    /// regardless of whether it actually parses.
    #[inline]
    #[must_use]
    pub fn has_version_prefix(text: &str) -> bool {
        VERSION_PREFIXES
            .iter()
            .any(|prefix| text.starts_with(prefix))
    }

    /// Parses `VK_VERSION_X_Y` (and its `API`/`BASE`/`COMPUTE`/`GRAPHICS` spellings) or `X.Y`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a version literal.
    #[inline]
    pub fn parse(text: &str) -> Result<Self, ParseVersionError> {
        let trimmed = text.trim();
        let (major, minor) = if let Some(rest) = VERSION_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
        {
            rest.split_once('_')
        } else {
            trimmed.split_once('.')
        }
        .ok_or_else(|| ParseVersionError::new(text))?;

        let parse_number = |number: &str| {
            if number.is_empty() || !number.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(ParseVersionError::new(text));
            }
            number.parse::<u32>().map_err(|_err| ParseVersionError::new(text))
        };
        Ok(Self::new(parse_number(major)?, parse_number(minor)?))
    }

    /// The packed encoding used by `VK_MAKE_API_VERSION(0, major, minor, 0)`.
    #[inline]
    #[must_use]
    pub const fn packed(self) -> u32 {
        (self.major << 22_u32) | (self.minor << 12_u32)
    }

    /// The `VK_API_VERSION_X_Y` macro naming this version.
    #[inline]
    #[must_use]
    pub fn api_macro(self) -> String {
        format!("VK_API_VERSION_{}_{}", self.major, self.minor)
    }
}

impl Display for ApiVersion {
    #[expect(
        clippy::min_ident_chars,
        reason = "It's a core library trait implementation"
    )]
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ParseVersionError;

    #[inline]
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ParseVersionError;

    #[inline]
    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<ApiVersion> for String {
    #[inline]
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

/// An error indicating that some text is not a version literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{text}` is not a version literal (expected `VK_VERSION_X_Y` or `X.Y`)")]
pub struct ParseVersionError {
    /// The offending text.
    text: String,
}

impl ParseVersionError {
    /// Creates self from the offending text.
    fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the text that failed to parse.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}
