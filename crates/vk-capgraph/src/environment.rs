//! The runtime environment compiled predicates are evaluated against.
//!
//! At code generation time the environment is symbolic. It is modelled as a trait so that
//! the same predicates can be evaluated against a concrete snapshot in tests and tools.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::version::ApiVersion;

/// A set of enabled entities.
pub trait EntitySet {
    /// Returns `true` if the entity with this canonical identifier is enabled.
    fn contains_entity(&self, name: &str) -> bool;
}

impl<S> EntitySet for HashSet<String, S>
where
    S: core::hash::BuildHasher,
{
    #[inline]
    fn contains_entity(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl EntitySet for BTreeSet<String> {
    #[inline]
    fn contains_entity(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl EntitySet for [&str] {
    #[inline]
    fn contains_entity(&self, name: &str) -> bool {
        self.contains(&name)
    }
}

impl EntitySet for [String] {
    #[inline]
    fn contains_entity(&self, name: &str) -> bool {
        self.iter().any(|entity| entity == name)
    }
}

/// The value of a property member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
#[expect(clippy::exhaustive_enums, reason = "property members are booleans or integers")]
pub enum PropertyValue {
    /// A `VkBool32` member.
    Bool(bool),
    /// An integer or flags member.
    Integer(u64),
}

/// Everything a compiled predicate may ask about a device.
pub trait Environment: EntitySet {
    /// The core version in use.
    fn version(&self) -> ApiVersion;

    /// Returns `true` if the named feature flag is enabled.
    fn flag(&self, name: &str) -> bool;

    /// Reads a property member, or [`None`] if the record was not queried.
    fn property(&self, record: &str, member: &str) -> Option<PropertyValue>;
}

/// A fixed environment snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct StaticEnvironment {
    /// The core version.
    pub version: ApiVersion,
    /// Enabled entities.
    pub entities: BTreeSet<String>,
    /// Enabled feature flags.
    pub flags: BTreeSet<String>,
    /// Populated property members, keyed by record and member.
    pub properties: BTreeMap<(String, String), PropertyValue>,
}

impl StaticEnvironment {
    /// An environment at `version` with nothing enabled.
    #[inline]
    #[must_use]
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Enables an entity.
    #[inline]
    #[must_use]
    pub fn with_entity(mut self, name: &str) -> Self {
        self.entities.insert(name.to_owned());
        self
    }

    /// Enables a feature flag.
    #[inline]
    #[must_use]
    pub fn with_flag(mut self, name: &str) -> Self {
        self.flags.insert(name.to_owned());
        self
    }

    /// Populates a property member.
    #[inline]
    #[must_use]
    pub fn with_property(mut self, record: &str, member: &str, value: PropertyValue) -> Self {
        self.properties
            .insert((record.to_owned(), member.to_owned()), value);
        self
    }
}

impl EntitySet for StaticEnvironment {
    #[inline]
    fn contains_entity(&self, name: &str) -> bool {
        self.entities.contains(name)
    }
}

impl Environment for StaticEnvironment {
    #[inline]
    fn version(&self) -> ApiVersion {
        self.version
    }

    #[inline]
    fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    #[inline]
    fn property(&self, record: &str, member: &str) -> Option<PropertyValue> {
        self.properties
            .get(&(record.to_owned(), member.to_owned()))
            .copied()
    }
}
