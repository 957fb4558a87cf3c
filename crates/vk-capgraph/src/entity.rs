//! Extensions with their resolved dependency predicate.

use crate::{
    depends::{self, EntityLookup, ParseDependsError, Requirement},
    diagnostic::{Diagnostics, Warning},
    environment::EntitySet,
    registry::{EntityRecord, Scope},
    version::ApiVersion,
};

/// An extension after dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResolvedEntity {
    /// Identifier.
    pub name: String,
    /// Device or instance scope.
    pub scope: Scope,
    /// Registry number. Higher numbers are newer.
    pub number: u32,
    /// The normalized dependency expression.
    pub requirement: Requirement,
    /// The core version this entity was promoted to.
    pub promoted_to: Option<ApiVersion>,
    /// What this entity was deprecated by, if it was deprecated.
    pub deprecated_by: Option<String>,
}

impl ResolvedEntity {
    /// Resolves the dependency expression of `record`.
    ///
    /// Unknown dependencies are dropped and reported to `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is malformed.
    #[inline]
    pub fn resolve<L>(
        record: &EntityRecord,
        lookup: &L,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, EntityError>
    where
        L: EntityLookup + ?Sized,
    {
        let resolution =
            depends::resolve(&record.depends, lookup).map_err(|source| EntityError::Depends {
                entity: record.name.clone(),
                source,
            })?;
        for entity in resolution.unresolved {
            diagnostics.record(Warning::UnresolvedDependency {
                owner: record.name.clone(),
                entity,
            });
        }
        Ok(Self {
            name: record.name.clone(),
            scope: record.scope,
            number: record.number,
            requirement: resolution.requirement,
            promoted_to: record.promoted_version(),
            deprecated_by: record.deprecatedby.clone(),
        })
    }

    /// Returns `true` if the dependencies hold for this version and set of enabled entities.
    #[inline]
    #[must_use]
    pub fn is_satisfied<E>(&self, version: ApiVersion, enabled: &E) -> bool
    where
        E: EntitySet + ?Sized,
    {
        self.requirement.is_satisfied(version, enabled)
    }

    /// The entities to enable before this one at `version`.
    ///
    /// Empty once the entity is part of core or the version satisfies its dependencies.
    #[inline]
    #[must_use]
    pub fn required_entities(&self, version: ApiVersion) -> Vec<&str> {
        if self.is_core_at(version) {
            return Vec::new();
        }
        self.requirement.required_entities(version)
    }

    /// Returns `true` if the entity was promoted to a core version at most `version`.
    #[inline]
    #[must_use]
    pub fn is_core_at(&self, version: ApiVersion) -> bool {
        self.promoted_to.is_some_and(|promoted| version >= promoted)
    }

    /// Returns `true` if the entity is deprecated.
    #[inline]
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.deprecated_by.is_some()
    }
}

/// An error indicating that an entity cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EntityError {
    /// The `depends` expression is malformed.
    #[error("malformed dependencies of `{entity}`: {source}")]
    Depends {
        /// The entity.
        entity: String,
        /// Source of the error.
        source: ParseDependsError,
    },
}
