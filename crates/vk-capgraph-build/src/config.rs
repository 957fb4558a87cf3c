//! Settings of a graph build.

use crate::merge;

/// Feature aggregate of the Vulkan registry.
pub const DEFAULT_FEATURE_BASE: &str = "VkPhysicalDeviceFeatures2";
/// Property aggregate of the Vulkan registry.
pub const DEFAULT_PROPERTY_BASE: &str = "VkPhysicalDeviceProperties2";

/// Settings of a graph build.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[serde(default, rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ResolveConfig {
    /// Base aggregate whose extending records carry feature flags.
    #[cfg_attr(feature = "clap", clap(long, default_value = DEFAULT_FEATURE_BASE))]
    pub feature_base: String,

    /// Base aggregate whose extending records carry device properties.
    ///
    /// Property tests probe the equivalent members of records superseded by its core aggregates.
    #[cfg_attr(feature = "clap", clap(long, default_value = DEFAULT_PROPERTY_BASE))]
    pub property_base: String,

    /// Further base aggregates to build preference forests for.
    #[cfg_attr(feature = "clap", clap(long = "extra-hierarchy-base"))]
    pub extra_hierarchy_bases: Vec<String>,

    /// Fail the build if any soft inconsistency is found.
    #[cfg_attr(feature = "clap", clap(long))]
    pub deny_warnings: bool,
}

impl Default for ResolveConfig {
    #[inline]
    fn default() -> Self {
        Self {
            feature_base: DEFAULT_FEATURE_BASE.to_owned(),
            property_base: DEFAULT_PROPERTY_BASE.to_owned(),
            extra_hierarchy_bases: Vec::new(),
            deny_warnings: false,
        }
    }
}

impl ResolveConfig {
    /// Parses a config from TOML. Missing settings take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config.
    #[inline]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parses a config from JSON. Missing settings take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config.
    #[inline]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Json)
    }

    /// Layers `patch` on top of this config.
    /// Only the settings of `patch` that differ from their defaults take effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the layered config cannot be represented, which should not happen.
    #[inline]
    pub fn merged(&self, patch: &Self) -> Result<Self, ConfigError> {
        merge::overlay(self, patch).map_err(ConfigError::Merge)
    }

    /// Every base aggregate to build a forest for, without duplicates, features first.
    #[inline]
    #[must_use]
    pub fn hierarchy_bases(&self) -> Vec<&str> {
        let mut bases: Vec<&str> = Vec::new();
        let all = [self.feature_base.as_str(), self.property_base.as_str()]
            .into_iter()
            .chain(self.extra_hierarchy_bases.iter().map(String::as_str));
        for base in all {
            if !base.is_empty() && !bases.contains(&base) {
                bases.push(base);
            }
        }
        bases
    }
}

/// An error indicating that a config could not be read.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The TOML text is not a valid config.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    /// The JSON text is not a valid config.
    #[error("invalid JSON config: {0}")]
    Json(#[source] serde_json::Error),
    /// Two configs could not be layered.
    #[error("failed to layer configs: {0}")]
    Merge(#[source] serde_json::Error),
}
