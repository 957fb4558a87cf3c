//! Soft inconsistencies found while building the graph.
//!
//! These never abort a build on their own. Every warning is logged as it is recorded
//! and kept so that callers can count or report them afterwards.

/// A soft inconsistency in the registry. The offending term or condition was omitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Warning {
    /// A dependency expression names an entity the registry does not know.
    #[error("`{owner}` depends on unknown entity `{entity}`")]
    UnresolvedDependency {
        /// The entity, record or capability whose expression contains the term.
        owner: String,
        /// The unknown name.
        entity: String,
    },
    /// A capability rule references a record that does not exist.
    #[error("capability `{capability}` references unknown record `{record}`")]
    UnknownRecord {
        /// The capability.
        capability: String,
        /// The unknown record.
        record: String,
    },
    /// A capability rule references a flag its record does not have.
    #[error("capability `{capability}` references unknown flag `{flag}` of `{record}`")]
    UnknownFlag {
        /// The capability.
        capability: String,
        /// The record the flag was looked up in.
        record: String,
        /// The unknown flag.
        flag: String,
    },
    /// A capability rule references a property member its record does not have.
    #[error("capability `{capability}` references unknown member `{member}` of `{record}`")]
    UnknownMember {
        /// The capability.
        capability: String,
        /// The record the member was looked up in.
        record: String,
        /// The unknown member.
        member: String,
    },
    /// A bitmask property test names a constant missing from the constant table.
    #[error("capability `{capability}` compares against unknown constant `{constant}`")]
    UnknownConstant {
        /// The capability.
        capability: String,
        /// The unknown constant.
        constant: String,
    },
    /// A property test value is neither `VK_TRUE`, a constant nor an unsigned integer.
    #[error("capability `{capability}` compares against unparsable value `{value}`")]
    UnparsablePropertyValue {
        /// The capability.
        capability: String,
        /// The offending value.
        value: String,
    },
    /// A record is declared as alias of a record that does not exist.
    #[error("`{alias}` is an alias of unknown record `{target}`")]
    DanglingAlias {
        /// The alias.
        alias: String,
        /// The missing target.
        target: String,
    },
    /// The aliases of a record name different owners while the record itself names none.
    #[error("aliases of `{canonical}` disagree on their owner ({})", .owners.join(", "))]
    AmbiguousAliasOwner {
        /// The canonical record.
        canonical: String,
        /// The distinct owners, sorted.
        owners: Vec<String>,
    },
    /// Two records share flags but neither is a subset of the other.
    #[error("`{left}` and `{right}` extending `{base}` overlap without containment")]
    PartialOverlap {
        /// The base aggregate both records extend.
        base: String,
        /// The preferred record of the first class.
        left: String,
        /// The preferred record of the second class.
        right: String,
    },
}

/// A collection of [`Warning`]s, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Diagnostics {
    /// The warnings.
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Records a warning and logs it.
    #[inline]
    pub fn record(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Appends all warnings of `other` without logging them again.
    #[inline]
    pub fn absorb(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }

    /// The recorded warnings.
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The number of recorded warnings.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consumes self, returning the warnings.
    #[inline]
    #[must_use]
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
