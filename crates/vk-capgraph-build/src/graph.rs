//! The resolved capability graph handed to code emitters.
//!
//! Building runs every analysis stage once, in order:
//! 1. entity dependencies are resolved against the set of known entities
//! 2. record aliases are normalized, inheriting owners and promotion versions
//! 3. a preference forest is built for every configured base aggregate
//! 4. property fields are matched against the core aggregates that superseded them
//! 5. SPIR-V capabilities and extensions are compiled into predicates
//!
//! The result is immutable. Queries for unknown names answer `false` or an empty result.

use std::collections::{BTreeMap, BTreeSet};

use vk_capgraph::{
    aggregate::FieldEquivalences,
    alias::{AliasError, AliasTable, NormalizedRecord},
    diagnostic::{Diagnostics, Warning},
    entity::{EntityError, ResolvedEntity},
    environment::Environment,
    hierarchy::{Candidate, Forest},
    predicate::{CompileContext, CompileError, CompiledCapability},
    registry::{CapabilityDecl, Registry},
    ApiVersion,
};

use crate::config::ResolveConfig;

/// Every decision table derived from one registry snapshot.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResolvedGraph {
    /// The registry header version the snapshot was taken from.
    header_version: Option<u32>,
    /// Entities by identifier.
    entities: BTreeMap<String, ResolvedEntity>,
    /// Normalized records.
    records: AliasTable,
    /// Preference forests by base aggregate.
    forests: BTreeMap<String, Forest>,
    /// Equivalent fields of property records.
    equivalences: FieldEquivalences,
    /// SPIR-V capabilities by name.
    capabilities: BTreeMap<String, CompiledCapability>,
    /// SPIR-V extensions by name.
    spirv_extensions: BTreeMap<String, CompiledCapability>,
    /// Soft inconsistencies found while building.
    diagnostics: Diagnostics,
}

impl ResolvedGraph {
    /// Runs every analysis stage over `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error on the first structural inconsistency, or if `config.deny_warnings` is
    /// set and any soft inconsistency was found.
    #[inline]
    pub fn build(registry: &Registry, config: &ResolveConfig) -> Result<Self, BuildError> {
        let mut diagnostics = Diagnostics::default();

        let mut lookup: BTreeMap<String, String> = BTreeMap::new();
        for entity in &registry.entities {
            if lookup
                .insert(entity.name.clone(), entity.name.clone())
                .is_some()
            {
                return Err(BuildError::DuplicateEntity {
                    entity: entity.name.clone(),
                });
            }
        }
        let mut entities = BTreeMap::new();
        for record in &registry.entities {
            let entity = ResolvedEntity::resolve(record, &lookup, &mut diagnostics)?;
            entities.insert(entity.name.clone(), entity);
        }
        log::debug!("resolved {} entities", entities.len());

        let records = AliasTable::normalize(&registry.records, &registry.entities, &mut diagnostics)?;

        let mut forests = BTreeMap::new();
        for base in config.hierarchy_bases() {
            let candidates = records
                .canonical_records()
                .filter(|record| record.extends(base))
                .map(|record| candidate(record, &entities));
            forests.insert(base.to_owned(), Forest::build(base, candidates, &mut diagnostics));
        }

        let equivalences = FieldEquivalences::build(&config.property_base, records.records());

        let context = CompileContext::new(&lookup, &records, &equivalences, &registry.constants);
        let capabilities = compile_all(&registry.capabilities, context, &mut diagnostics)?;
        let spirv_extensions = compile_all(&registry.spirv_extensions, context, &mut diagnostics)?;
        log::debug!(
            "compiled {} capabilities and {} SPIR-V extensions",
            capabilities.len(),
            spirv_extensions.len()
        );

        if config.deny_warnings && !diagnostics.is_empty() {
            return Err(BuildError::Warnings {
                warnings: diagnostics.into_warnings(),
            });
        }
        if !diagnostics.is_empty() {
            log::debug!("graph built with {} warnings", diagnostics.len());
        }

        Ok(Self {
            header_version: registry.header_version,
            entities,
            records,
            forests,
            equivalences,
            capabilities,
            spirv_extensions,
            diagnostics,
        })
    }

    /// The registry header version the snapshot was taken from.
    #[inline]
    #[must_use]
    pub const fn header_version(&self) -> Option<u32> {
        self.header_version
    }

    /// Looks up an entity.
    #[inline]
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entities.get(name)
    }

    /// All entities, sorted by identifier.
    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.values()
    }

    /// Returns `true` if the dependencies of `name` hold. Unknown entities are never satisfied.
    #[inline]
    #[must_use]
    pub fn entity_satisfied(&self, name: &str, version: ApiVersion, enabled: &[&str]) -> bool {
        self.entity(name)
            .is_some_and(|entity| entity.is_satisfied(version, enabled))
    }

    /// The entities to enable along with `roots` at `version`, dependencies first.
    ///
    /// Entities already part of core at `version` are skipped together with their own
    /// dependencies. Unknown roots are ignored.
    #[inline]
    #[must_use]
    pub fn entity_closure(&self, roots: &[&str], version: ApiVersion) -> Vec<&str> {
        let mut visited = BTreeSet::new();
        let mut closure = Vec::new();
        for root in roots {
            self.visit(root, version, &mut visited, &mut closure);
        }
        closure
    }

    /// Depth-first post-order walk for [`Self::entity_closure`].
    fn visit<'graph>(
        &'graph self,
        name: &str,
        version: ApiVersion,
        visited: &mut BTreeSet<&'graph str>,
        closure: &mut Vec<&'graph str>,
    ) {
        let Some(entity) = self.entities.get(name) else {
            return;
        };
        if !visited.insert(entity.name.as_str()) {
            return;
        }
        if entity.is_core_at(version) {
            log::trace!("`{name}` is core at {version}");
            return;
        }
        for dependency in entity.required_entities(version) {
            self.visit(dependency, version, visited, closure);
        }
        closure.push(entity.name.as_str());
    }

    /// Normalized records.
    #[inline]
    #[must_use]
    pub const fn records(&self) -> &AliasTable {
        &self.records
    }

    /// The canonical identifier of a record.
    #[inline]
    #[must_use]
    pub fn canonical_record(&self, name: &str) -> Option<&str> {
        self.records.canonical(name)
    }

    /// Identifiers of the records owned by `entity`, aliases included, sorted.
    #[inline]
    #[must_use]
    pub fn records_of_entity(&self, entity: &str) -> Vec<&str> {
        self.records
            .records()
            .filter(|record| record.entity.as_deref() == Some(entity))
            .map(|record| record.name.as_str())
            .collect()
    }

    /// Canonical records extending `base` that are part of core at `version`, sorted.
    #[inline]
    #[must_use]
    pub fn records_at_version(&self, base: &str, version: ApiVersion) -> Vec<&str> {
        self.records
            .canonical_records()
            .filter(|record| record.extends(base))
            .filter(|record| record.core_version.is_some_and(|core| core <= version))
            .map(|record| record.name.as_str())
            .collect()
    }

    /// The preference forest of a base aggregate, if one was configured.
    #[inline]
    #[must_use]
    pub fn forest(&self, base: &str) -> Option<&Forest> {
        self.forests.get(base)
    }

    /// Equivalent fields of property records.
    #[inline]
    #[must_use]
    pub const fn field_equivalences(&self) -> &FieldEquivalences {
        &self.equivalences
    }

    /// Looks up a compiled SPIR-V capability.
    #[inline]
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&CompiledCapability> {
        self.capabilities.get(name)
    }

    /// Names of all SPIR-V capabilities, sorted.
    #[inline]
    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    /// Returns `true` if the capability is supported by `environment`.
    #[inline]
    #[must_use]
    pub fn supported<E>(&self, name: &str, environment: &E) -> bool
    where
        E: Environment + ?Sized,
    {
        self.capability(name)
            .is_some_and(|capability| capability.supported(environment))
    }

    /// The entities to enable for the capability at `version`.
    #[inline]
    #[must_use]
    pub fn required_entities(&self, name: &str, version: ApiVersion) -> BTreeSet<String> {
        self.capability(name)
            .map(|capability| capability.required_entities(version))
            .unwrap_or_default()
    }

    /// The feature flags that would each enable the capability.
    #[inline]
    #[must_use]
    pub fn required_flags(&self, name: &str) -> Vec<&str> {
        self.capability(name)
            .map(CompiledCapability::required_flags)
            .unwrap_or_default()
    }

    /// Looks up a compiled SPIR-V extension.
    #[inline]
    #[must_use]
    pub fn spirv_extension(&self, name: &str) -> Option<&CompiledCapability> {
        self.spirv_extensions.get(name)
    }

    /// Names of all SPIR-V extensions, sorted.
    #[inline]
    pub fn spirv_extension_names(&self) -> impl Iterator<Item = &str> {
        self.spirv_extensions.keys().map(String::as_str)
    }

    /// Returns `true` if the SPIR-V extension is supported by `environment`.
    #[inline]
    #[must_use]
    pub fn spirv_extension_supported<E>(&self, name: &str, environment: &E) -> bool
    where
        E: Environment + ?Sized,
    {
        self.spirv_extension(name)
            .is_some_and(|extension| extension.supported(environment))
    }

    /// The entities to enable for the SPIR-V extension at `version`.
    #[inline]
    #[must_use]
    pub fn spirv_extension_requirements(&self, name: &str, version: ApiVersion) -> BTreeSet<String> {
        self.spirv_extension(name)
            .map(|extension| extension.required_entities(version))
            .unwrap_or_default()
    }

    /// Soft inconsistencies found while building.
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    /// Number of soft inconsistencies found while building.
    #[inline]
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Fingerprints a canonical record, ranked by its owning entity.
fn candidate(record: &NormalizedRecord, entities: &BTreeMap<String, ResolvedEntity>) -> Candidate {
    let owner = record
        .entity
        .as_deref()
        .and_then(|entity| entities.get(entity));
    Candidate::new(&record.name, record.flags()).owned(
        owner.is_some_and(ResolvedEntity::is_deprecated),
        owner.map_or(0, |entity| entity.number),
    )
}

/// Compiles a list of declarations, rejecting duplicate names.
fn compile_all(
    decls: &[CapabilityDecl],
    context: CompileContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<String, CompiledCapability>, BuildError> {
    let mut compiled = BTreeMap::new();
    for decl in decls {
        if compiled.contains_key(&decl.name) {
            return Err(BuildError::DuplicateCapability {
                capability: decl.name.clone(),
            });
        }
        let capability = CompiledCapability::compile(decl, context, diagnostics)?;
        compiled.insert(decl.name.clone(), capability);
    }
    Ok(compiled)
}

/// An error indicating that a graph cannot be built.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Two entities share an identifier.
    #[error("entity `{entity}` is declared more than once")]
    DuplicateEntity {
        /// The entity.
        entity: String,
    },
    /// Two capabilities or two SPIR-V extensions share a name.
    #[error("capability `{capability}` is declared more than once")]
    DuplicateCapability {
        /// The capability.
        capability: String,
    },
    /// An entity cannot be resolved.
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// Records cannot be normalized.
    #[error(transparent)]
    Alias(#[from] AliasError),
    /// A capability cannot be compiled.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Soft inconsistencies were found and warnings are denied.
    #[error("{} warnings while warnings are denied, first: {}", .warnings.len(), first_warning(.warnings))]
    Warnings {
        /// Every warning, in the order found.
        warnings: Vec<Warning>,
    },
}

/// The first warning, for error messages.
fn first_warning(warnings: &[Warning]) -> String {
    warnings
        .first()
        .map_or_else(String::new, ToString::to_string)
}
