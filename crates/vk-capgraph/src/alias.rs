//! Canonicalization of record aliases and propagation of their metadata.
//!
//! A record and its aliases denote the same struct. After normalization every identifier,
//! canonical or alias, resolves to one [`NormalizedRecord`] carrying the shared members,
//! structure-type tag, owning entity and core version.
//!
//! Per class, the owning entity and the core version are settled like this:
//! - a value declared on the canonical record wins, and an alias declaring a different one is an error;
//! - otherwise a value declared on exactly one distinct alias is shared by the whole class;
//! - otherwise, for the core version, the promotion version of the owning entity is used the same way;
//! - aliases that declare different values while the canonical declares none keep their own values.
//!
//! Settled values are written back as declarations by [`AliasTable::to_declarations`],
//! and normalizing those again yields the same table.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    diagnostic::{Diagnostics, Warning},
    naming,
    registry::{EntityRecord, Member, RecordDecl},
    version::ApiVersion,
};

/// A record after alias normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct NormalizedRecord {
    /// The identifier of this record.
    pub name: String,
    /// The canonical identifier. Equal to `name` for canonical records.
    pub canonical: String,
    /// The base aggregates this record can be chained into.
    pub structextends: Vec<String>,
    /// Members in declaration order.
    pub members: Vec<Member>,
    /// The owning entity.
    pub entity: Option<String>,
    /// The core version the record is part of.
    pub core_version: Option<ApiVersion>,
    /// The structure-type tag.
    pub stype: String,
}

impl NormalizedRecord {
    /// Returns `true` if this is the canonical form.
    #[inline]
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.name == self.canonical
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

    /// The accessor an emitter generates for this identifier.
    #[inline]
    #[must_use]
    pub fn accessor_name(&self) -> String {
        naming::accessor_name(&self.name)
    }
}

/// All records keyed by identifier, with alias maps in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct AliasTable {
    /// Every known identifier.
    records: BTreeMap<String, NormalizedRecord>,
    /// Canonical identifier to its aliases, sorted.
    aliases: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    /// Builds the table from declared records.
    ///
    /// Dangling aliases are reported to `diagnostics` and left out of the table.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate identifiers, alias cycles, or aliases whose declared
    /// metadata, tag or members disagree with their canonical record.
    #[inline]
    pub fn normalize(
        records: &[RecordDecl],
        entities: &[EntityRecord],
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, AliasError> {
        let mut declared: BTreeMap<&str, &RecordDecl> = BTreeMap::new();
        for record in records {
            if declared.insert(record.name.as_str(), record).is_some() {
                return Err(AliasError::DuplicateRecord {
                    record: record.name.clone(),
                });
            }
        }
        let promotions: BTreeMap<&str, ApiVersion> = entities
            .iter()
            .filter_map(|entity| Some((entity.name.as_str(), entity.promoted_version()?)))
            .collect();

        let mut classes: BTreeMap<&str, Vec<&RecordDecl>> = BTreeMap::new();
        for record in declared.values().copied() {
            match root_of(record, &declared)? {
                Ok(root) if root == record.name => {
                    classes.entry(root).or_default();
                }
                Ok(root) => classes.entry(root).or_default().push(record),
                Err(target) => diagnostics.record(Warning::DanglingAlias {
                    alias: record.name.clone(),
                    target: target.to_owned(),
                }),
            }
        }

        let mut table = Self::default();
        for (canonical, aliases) in classes {
            let Some(canonical) = declared.get(canonical).copied() else {
                continue;
            };
            table.settle_class(canonical, &aliases, &promotions, diagnostics)?;
        }
        log::debug!(
            "normalized {} records, {} of them aliases",
            table.records.len(),
            table.records.len() - table.aliases.len()
        );
        Ok(table)
    }

    /// Settles the shared data of one canonical record and its aliases and inserts them.
    fn settle_class(
        &mut self,
        canonical: &RecordDecl,
        aliases: &[&RecordDecl],
        promotions: &BTreeMap<&str, ApiVersion>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AliasError> {
        let class: Vec<&RecordDecl> = core::iter::once(canonical)
            .chain(aliases.iter().copied())
            .collect();

        let stype = canonical
            .stype
            .clone()
            .unwrap_or_else(|| naming::structure_type_from_name(&canonical.name));
        let mut members: Option<&Vec<Member>> = None;
        for record in &class {
            if let Some(found) = record.stype.as_ref().filter(|found| **found != stype) {
                return Err(AliasError::StructureTypeMismatch {
                    canonical: canonical.name.clone(),
                    alias: record.name.clone(),
                    expected: stype,
                    found: found.clone(),
                });
            }
            if record.members.is_empty() {
                continue;
            }
            match members {
                Some(shared) if *shared != record.members => {
                    return Err(AliasError::MemberMismatch {
                        canonical: canonical.name.clone(),
                        alias: record.name.clone(),
                    });
                }
                Some(_) => {}
                None => members = Some(&record.members),
            }
        }
        let structextends = class
            .iter()
            .map(|record| &record.structextends)
            .find(|extends| !extends.is_empty())
            .cloned()
            .unwrap_or_default();

        let entities = match settle(
            canonical.entity.as_ref(),
            aliases.iter().map(|alias| alias.entity.as_ref()),
        ) {
            Settled::Uniform(entity) => vec![entity; class.len()],
            Settled::Conflict(expected, found) => {
                return Err(AliasError::OwnerConflict {
                    canonical: canonical.name.clone(),
                    alias: alias_with(aliases, |alias| alias.entity.as_ref() == Some(&found)),
                    expected,
                    found,
                });
            }
            Settled::Ambiguous(owners) => {
                diagnostics.record(Warning::AmbiguousAliasOwner {
                    canonical: canonical.name.clone(),
                    owners,
                });
                class.iter().map(|record| record.entity.clone()).collect()
            }
        };

        let versions = match settle(
            canonical.core_version.as_ref(),
            aliases.iter().map(|alias| alias.core_version.as_ref()),
        ) {
            Settled::Uniform(Some(version)) => vec![Some(version); class.len()],
            Settled::Uniform(None) => {
                let derived: Vec<Option<ApiVersion>> = class
                    .iter()
                    .map(|record| {
                        record
                            .entity
                            .as_deref()
                            .and_then(|entity| promotions.get(entity).copied())
                    })
                    .collect();
                let settled = settle(
                    derived.first().and_then(Option::as_ref),
                    derived.iter().skip(1).map(Option::as_ref),
                );
                match settled {
                    Settled::Uniform(version) => vec![version; class.len()],
                    Settled::Conflict(version, _) => vec![Some(version); class.len()],
                    Settled::Ambiguous(_) => derived,
                }
            }
            Settled::Conflict(expected, found) => {
                return Err(AliasError::VersionConflict {
                    canonical: canonical.name.clone(),
                    alias: alias_with(aliases, |alias| alias.core_version == Some(found)),
                    expected,
                    found,
                });
            }
            Settled::Ambiguous(versions) => {
                log::debug!(
                    "aliases of `{}` declare different core versions {versions:?}",
                    canonical.name
                );
                class.iter().map(|record| record.core_version).collect()
            }
        };

        let members = members.cloned().unwrap_or_default();
        for ((record, entity), core_version) in class.iter().zip(entities).zip(versions) {
            log::trace!(
                "`{}` -> `{}` owned by {entity:?}, core {core_version:?}",
                record.name,
                canonical.name
            );
            self.records.insert(
                record.name.clone(),
                NormalizedRecord {
                    name: record.name.clone(),
                    canonical: canonical.name.clone(),
                    structextends: structextends.clone(),
                    members: members.clone(),
                    entity,
                    core_version,
                    stype: stype.clone(),
                },
            );
        }
        let mut alias_names: Vec<String> = aliases.iter().map(|alias| alias.name.clone()).collect();
        alias_names.sort();
        self.aliases.insert(canonical.name.clone(), alias_names);
        Ok(())
    }

    /// The canonical identifier for any known identifier.
    #[inline]
    #[must_use]
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.records.get(name).map(|record| record.canonical.as_str())
    }

    /// Looks up any known identifier.
    #[inline]
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&NormalizedRecord> {
        self.records.get(name)
    }

    /// The aliases of a canonical identifier, sorted. Empty for unknown or alias identifiers.
    #[inline]
    #[must_use]
    pub fn aliases_of(&self, canonical: &str) -> &[String] {
        self.aliases.get(canonical).map_or(&[], Vec::as_slice)
    }

    /// All canonical records, sorted by identifier.
    #[inline]
    pub fn canonical_records(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.aliases
            .keys()
            .filter_map(|canonical| self.records.get(canonical))
    }

    /// All records, canonical and aliases, sorted by identifier.
    #[inline]
    pub fn records(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.values()
    }

    /// Writes the settled table back as declarations.
    #[inline]
    #[must_use]
    pub fn to_declarations(&self) -> Vec<RecordDecl> {
        self.records
            .values()
            .map(|record| RecordDecl {
                name: record.name.clone(),
                structextends: record.structextends.clone(),
                members: record.members.clone(),
                alias: (!record.is_canonical()).then(|| record.canonical.clone()),
                entity: record.entity.clone(),
                core_version: record.core_version,
                stype: Some(record.stype.clone()),
            })
            .collect()
    }
}

/// Follows alias links to the root. Returns `Err` with the missing target of a dangling chain.
fn root_of<'decl>(
    record: &'decl RecordDecl,
    declared: &BTreeMap<&str, &'decl RecordDecl>,
) -> Result<Result<&'decl str, &'decl str>, AliasError> {
    let mut current = record;
    let mut seen = BTreeSet::new();
    while let Some(target) = current.alias.as_deref() {
        if !seen.insert(current.name.as_str()) {
            return Err(AliasError::Cycle {
                record: record.name.clone(),
            });
        }
        match declared.get(target) {
            Some(next) => current = next,
            None => return Ok(Err(target)),
        }
    }
    Ok(Ok(current.name.as_str()))
}

/// The outcome of settling one field across a class.
enum Settled<T> {
    /// Every member gets this value.
    Uniform(Option<T>),
    /// The canonical value and a differing alias value.
    Conflict(T, T),
    /// Several distinct alias values and no canonical value, sorted.
    Ambiguous(Vec<T>),
}

/// Settles one field from the canonical value and the alias values.
fn settle<'value, T, I>(canonical: Option<&'value T>, aliases: I) -> Settled<T>
where
    T: Clone + Ord + 'value,
    I: Iterator<Item = Option<&'value T>>,
{
    let distinct: BTreeSet<&T> = aliases.flatten().collect();
    if let Some(value) = canonical {
        return match distinct.into_iter().find(|other| *other != value) {
            Some(other) => Settled::Conflict(value.clone(), other.clone()),
            None => Settled::Uniform(Some(value.clone())),
        };
    }
    if distinct.len() > 1 {
        return Settled::Ambiguous(distinct.into_iter().cloned().collect());
    }
    Settled::Uniform(distinct.into_iter().next().cloned())
}

/// The name of the first alias matching `predicate`.
fn alias_with<F>(aliases: &[&RecordDecl], predicate: F) -> String
where
    F: Fn(&RecordDecl) -> bool,
{
    aliases
        .iter()
        .find(|alias| predicate(alias))
        .map(|alias| alias.name.clone())
        .unwrap_or_default()
}

/// An error indicating inconsistent alias declarations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AliasError {
    /// The same identifier is declared twice.
    #[error("record `{record}` is declared more than once")]
    DuplicateRecord {
        /// The duplicated identifier.
        record: String,
    },
    /// Following alias links leads back to a record already visited.
    #[error("alias chain of `{record}` is cyclic")]
    Cycle {
        /// The record whose chain is cyclic.
        record: String,
    },
    /// An alias names a different owning entity than its canonical record.
    #[error("alias `{alias}` is owned by `{found}` but `{canonical}` is owned by `{expected}`")]
    OwnerConflict {
        /// The canonical record.
        canonical: String,
        /// The alias.
        alias: String,
        /// The owner of the canonical record.
        expected: String,
        /// The owner of the alias.
        found: String,
    },
    /// An alias declares a different core version than its canonical record.
    #[error("alias `{alias}` is core in {found} but `{canonical}` is core in {expected}")]
    VersionConflict {
        /// The canonical record.
        canonical: String,
        /// The alias.
        alias: String,
        /// The core version of the canonical record.
        expected: ApiVersion,
        /// The core version of the alias.
        found: ApiVersion,
    },
    /// An alias declares a different structure-type tag than its canonical record.
    #[error("alias `{alias}` has structure type `{found}` but `{canonical}` has `{expected}`")]
    StructureTypeMismatch {
        /// The canonical record.
        canonical: String,
        /// The alias.
        alias: String,
        /// The tag of the canonical record.
        expected: String,
        /// The tag declared by the alias.
        found: String,
    },
    /// An alias declares different members than its canonical record.
    #[error("alias `{alias}` declares different members than `{canonical}`")]
    MemberMismatch {
        /// The canonical record.
        canonical: String,
        /// The alias.
        alias: String,
    },
}
