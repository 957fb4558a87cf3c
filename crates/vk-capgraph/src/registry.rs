//! The registry snapshot as produced by the external parser.
//!
//! Field names follow the attribute names of the registry itself
//! (`depends`, `promotedto`, `structextends`, ...) so that a parser can serialize its
//! intermediate records straight into this shape.

use std::collections::BTreeMap;

use crate::version::ApiVersion;

/// Whether an entity is enabled per device or per instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[expect(clippy::exhaustive_enums, reason = "the registry knows only these scopes")]
pub enum Scope {
    /// A device extension.
    #[default]
    Device,
    /// An instance extension.
    Instance,
}

/// An extension as declared in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct EntityRecord {
    /// Identifier, e.g. `VK_KHR_push_descriptor`.
    pub name: String,
    /// Device or instance scope.
    #[serde(default, rename = "type")]
    pub scope: Scope,
    /// Registry number. Higher numbers are newer.
    #[serde(default)]
    pub number: u32,
    /// Raw dependency expression.
    #[serde(default)]
    pub depends: String,
    /// Version or entity this entity was promoted to.
    #[serde(default)]
    pub promotedto: Option<String>,
    /// Version or entity this entity was deprecated by. Empty if deprecated without replacement.
    #[serde(default)]
    pub deprecatedby: Option<String>,
}

impl EntityRecord {
    /// Creates an entity with the given name and number.
    #[inline]
    #[must_use]
    pub fn new(name: &str, number: u32) -> Self {
        Self {
            name: name.to_owned(),
            number,
            ..Self::default()
        }
    }

    /// The core version this entity was promoted to, if it was promoted into core.
    ///
    /// Promotion to another entity yields [`None`].
    #[inline]
    #[must_use]
    pub fn promoted_version(&self) -> Option<ApiVersion> {
        self.promotedto
            .as_deref()
            .filter(|target| ApiVersion::has_version_prefix(target))
            .and_then(|target| ApiVersion::parse(target).ok())
    }
}

/// A `(type, name)` member pair of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct Member {
    /// The member type, e.g. `VkBool32` or `uint32_t`.
    #[serde(rename = "type")]
    pub ty: String,
    /// The member name.
    pub name: String,
}

impl Member {
    /// The type of boolean members.
    pub const FLAG_TYPE: &'static str = "VkBool32";

    /// Creates a member.
    #[inline]
    #[must_use]
    pub fn new(ty: &str, name: &str) -> Self {
        Self {
            ty: ty.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Creates a boolean member.
    #[inline]
    #[must_use]
    pub fn flag(name: &str) -> Self {
        Self::new(Self::FLAG_TYPE, name)
    }

    /// Returns `true` if the member is a boolean flag.
    #[inline]
    #[must_use]
    pub fn is_flag(&self) -> bool {
        self.ty == Self::FLAG_TYPE
    }

    /// Returns `true` for the `sType`/`pNext` chain header every extending struct carries.
    #[inline]
    #[must_use]
    pub fn is_chain_header(&self) -> bool {
        matches!(self.name.as_str(), "sType" | "pNext")
    }
}

/// A feature or property struct as declared in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct RecordDecl {
    /// Identifier, e.g. `VkPhysicalDevicePushDescriptorPropertiesKHR`.
    pub name: String,
    /// The base aggregates this record can be chained into.
    #[serde(default)]
    pub structextends: Vec<String>,
    /// Members in declaration order. Empty for aliases that only declare their target.
    #[serde(default)]
    pub members: Vec<Member>,
    /// The record this one is an alias of.
    #[serde(default)]
    pub alias: Option<String>,
    /// The entity that introduced this record.
    #[serde(default, alias = "extension")]
    pub entity: Option<String>,
    /// The core version that introduced this record directly.
    #[serde(default, alias = "version")]
    pub core_version: Option<ApiVersion>,
    /// Declared structure-type tag.
    #[serde(default, alias = "sType")]
    pub stype: Option<String>,
}

impl RecordDecl {
    /// Creates a record extending `base`.
    #[inline]
    #[must_use]
    pub fn new(name: &str, base: &str) -> Self {
        Self {
            name: name.to_owned(),
            structextends: vec![base.to_owned()],
            ..Self::default()
        }
    }

    /// Returns `true` if the record can be chained into `base`.
    #[inline]
    #[must_use]
    pub fn extends(&self, base: &str) -> bool {
        self.structextends.iter().any(|extended| extended == base)
    }

    /// The boolean flags of the record, in declaration order.
    #[inline]
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|member| member.is_flag())
            .map(|member| member.name.as_str())
    }

    /// Looks up a member by name.
    #[inline]
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }
}

/// One enable rule of a capability.
///
/// Every present condition is an alternative: the rule holds if its gate holds
/// and at least one of them does.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct EnableRule {
    /// Core version condition.
    #[serde(default)]
    pub version: Option<ApiVersion>,
    /// Entity condition.
    #[serde(default)]
    pub extension: Option<String>,
    /// Feature record of a flag condition.
    #[serde(default, rename = "struct")]
    pub record: Option<String>,
    /// Flag of a flag condition.
    #[serde(default)]
    pub feature: Option<String>,
    /// Property record of a property condition.
    #[serde(default)]
    pub property: Option<String>,
    /// Member of a property condition.
    #[serde(default)]
    pub member: Option<String>,
    /// Value a property member is tested against.
    #[serde(default)]
    pub value: Option<String>,
    /// The gate, a dependency expression.
    #[serde(default)]
    pub requires: Option<String>,
}

impl EnableRule {
    /// A rule enabled by a core version.
    #[inline]
    #[must_use]
    pub fn version(version: ApiVersion) -> Self {
        Self {
            version: Some(version),
            ..Self::default()
        }
    }

    /// A rule enabled by an entity.
    #[inline]
    #[must_use]
    pub fn extension(name: &str) -> Self {
        Self {
            extension: Some(name.to_owned()),
            ..Self::default()
        }
    }

    /// A rule enabled by a feature flag of a record.
    #[inline]
    #[must_use]
    pub fn feature(record: &str, flag: &str) -> Self {
        Self {
            record: Some(record.to_owned()),
            feature: Some(flag.to_owned()),
            ..Self::default()
        }
    }

    /// A rule enabled by a property member compared against a value.
    #[inline]
    #[must_use]
    pub fn property(record: &str, member: &str, value: &str) -> Self {
        Self {
            property: Some(record.to_owned()),
            member: Some(member.to_owned()),
            value: Some(value.to_owned()),
            ..Self::default()
        }
    }

    /// Sets the gate.
    #[inline]
    #[must_use]
    pub fn requiring(mut self, requires: &str) -> Self {
        self.requires = Some(requires.to_owned());
        self
    }
}

/// A SPIR-V capability or extension with its enable rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct CapabilityDecl {
    /// Identifier, e.g. `StorageBuffer16BitAccess`.
    pub name: String,
    /// Rules in declaration order.
    #[serde(default, alias = "enable")]
    pub enables: Vec<EnableRule>,
}

impl CapabilityDecl {
    /// Creates a capability.
    #[inline]
    #[must_use]
    pub fn new(name: &str, enables: Vec<EnableRule>) -> Self {
        Self {
            name: name.to_owned(),
            enables,
        }
    }
}

/// A full registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub struct Registry {
    /// The registry header version, e.g. `VK_HEADER_VERSION`.
    #[serde(default)]
    pub header_version: Option<u32>,
    /// Extensions.
    #[serde(default, alias = "extensions")]
    pub entities: Vec<EntityRecord>,
    /// Feature and property structs, canonical and aliases alike.
    #[serde(default, alias = "structs")]
    pub records: Vec<RecordDecl>,
    /// SPIR-V capabilities.
    #[serde(default, alias = "spirvcapabilities")]
    pub capabilities: Vec<CapabilityDecl>,
    /// SPIR-V extensions.
    #[serde(default, alias = "spirvextensions")]
    pub spirv_extensions: Vec<CapabilityDecl>,
    /// Numeric values of enumerants referenced by property tests, e.g. `VK_SUBGROUP_FEATURE_BASIC_BIT`.
    #[serde(default)]
    pub constants: BTreeMap<String, u64>,
}
