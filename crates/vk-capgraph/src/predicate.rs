//! Compilation of enable rules into predicates over an [`Environment`].
//!
//! Rules of a capability are grouped by their gate. A group holds if its gate holds and at least
//! one of its conditions does, and the capability is supported if any group holds.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    aggregate::{Field, FieldEquivalences},
    alias::AliasTable,
    depends::{self, EntityLookup, ParseDependsError, Requirement},
    diagnostic::{Diagnostics, Warning},
    environment::{Environment, PropertyValue},
    registry::{CapabilityDecl, EnableRule},
    version::ApiVersion,
};

/// The value that makes a property test a boolean test.
const TRUE_LITERAL: &str = "VK_TRUE";

/// How a property value is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PropertyTest {
    /// The member is `VK_TRUE`.
    IsTrue,
    /// The member shares a bit with the named constant.
    AnyBits {
        /// The constant, e.g. `VK_SUBGROUP_FEATURE_ARITHMETIC_BIT`.
        constant: String,
        /// Its numeric value.
        mask: u64,
    },
    /// The member is at least this value.
    AtLeast(u64),
}

impl PropertyTest {
    /// Parses the value of a rule.
    fn parse(value: &str, constants: &BTreeMap<String, u64>) -> Result<Self, Warning> {
        if value == TRUE_LITERAL {
            return Ok(Self::IsTrue);
        }
        if value.starts_with("VK_") {
            return constants
                .get(value)
                .map(|mask| Self::AnyBits {
                    constant: value.to_owned(),
                    mask: *mask,
                })
                .ok_or_else(|| Warning::UnknownConstant {
                    capability: String::new(),
                    constant: value.to_owned(),
                });
        }
        value
            .trim()
            .parse()
            .map(Self::AtLeast)
            .map_err(|_err| Warning::UnparsablePropertyValue {
                capability: String::new(),
                value: value.to_owned(),
            })
    }

    /// Applies the test to a value.
    #[inline]
    #[must_use]
    pub fn holds(&self, value: PropertyValue) -> bool {
        let number = match value {
            PropertyValue::Bool(flag) => u64::from(flag),
            PropertyValue::Integer(number) => number,
        };
        match self {
            Self::IsTrue => number == 1,
            Self::AnyBits { mask, .. } => number & mask != 0,
            Self::AtLeast(threshold) => number >= *threshold,
        }
    }
}

/// A property test with every field it may be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PropertyCheck {
    /// The declared field first, then its equivalents in superseding or superseded records.
    pub probes: Vec<Field>,
    /// The comparison.
    pub test: PropertyTest,
}

/// A single alternative of a rule group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Condition {
    /// The core version is at least this.
    Version(ApiVersion),
    /// The entity is enabled.
    Entity(String),
    /// The feature flag is enabled.
    Flag(String),
    /// A property test holds for any probed field.
    Property(PropertyCheck),
}

impl Condition {
    /// Evaluates the condition.
    #[inline]
    #[must_use]
    pub fn holds<E>(&self, environment: &E) -> bool
    where
        E: Environment + ?Sized,
    {
        match self {
            Self::Version(version) => environment.version() >= *version,
            Self::Entity(name) => environment.contains_entity(name),
            Self::Flag(name) => environment.flag(name),
            Self::Property(check) => check.probes.iter().any(|(record, member)| {
                environment
                    .property(record, member)
                    .is_some_and(|value| check.test.holds(value))
            }),
        }
    }
}

/// Rules sharing one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RuleGroup {
    /// The gate. Empty if the rules are ungated.
    pub gate: Requirement,
    /// Deduplicated alternatives, in rule order.
    pub conditions: Vec<Condition>,
}

impl RuleGroup {
    /// Evaluates the group.
    #[inline]
    #[must_use]
    pub fn holds<E>(&self, environment: &E) -> bool
    where
        E: Environment + ?Sized,
    {
        self.gate.is_satisfied(environment.version(), environment)
            && self
                .conditions
                .iter()
                .any(|condition| condition.holds(environment))
    }
}

/// Everything rules are resolved against.
#[derive(Clone, Copy)]
#[non_exhaustive]
pub struct CompileContext<'graph> {
    /// Entity names to canonical identifiers.
    pub entities: &'graph dyn EntityLookup,
    /// Normalized records.
    pub records: &'graph AliasTable,
    /// Equivalent property fields.
    pub equivalences: &'graph FieldEquivalences,
    /// Values of named constants.
    pub constants: &'graph BTreeMap<String, u64>,
}

impl<'graph> CompileContext<'graph> {
    /// Creates a context.
    #[inline]
    #[must_use]
    pub fn new(
        entities: &'graph dyn EntityLookup,
        records: &'graph AliasTable,
        equivalences: &'graph FieldEquivalences,
        constants: &'graph BTreeMap<String, u64>,
    ) -> Self {
        Self {
            entities,
            records,
            equivalences,
            constants,
        }
    }
}

/// A capability compiled into gated rule groups.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CompiledCapability {
    /// Identifier.
    pub name: String,
    /// Groups in order of their first rule.
    pub groups: Vec<RuleGroup>,
}

impl CompiledCapability {
    /// Compiles the rules of a capability.
    ///
    /// Conditions referencing unknown entities, records, flags, members or constants are
    /// omitted and reported to `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns an error if a gate is not a well-formed dependency expression.
    #[inline]
    pub fn compile(
        decl: &CapabilityDecl,
        context: CompileContext<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, CompileError> {
        let mut groups: Vec<RuleGroup> = Vec::new();
        for rule in &decl.enables {
            let gate = match rule.requires.as_deref() {
                Some(requires) => {
                    let resolution = depends::resolve(requires, context.entities).map_err(
                        |source| CompileError::Gate {
                            capability: decl.name.clone(),
                            source,
                        },
                    )?;
                    for entity in resolution.unresolved {
                        diagnostics.record(Warning::UnresolvedDependency {
                            owner: decl.name.clone(),
                            entity,
                        });
                    }
                    resolution.requirement
                }
                None => Requirement::default(),
            };

            let conditions = conditions_of(&decl.name, rule, context, diagnostics);
            let existing = groups
                .iter()
                .position(|group| group.gate.same_alternatives(&gate));
            let group = match existing {
                Some(index) => groups.get_mut(index),
                None => {
                    groups.push(RuleGroup {
                        gate,
                        conditions: Vec::new(),
                    });
                    groups.last_mut()
                }
            };
            if let Some(group) = group {
                for condition in conditions {
                    if !group.conditions.contains(&condition) {
                        group.conditions.push(condition);
                    }
                }
            }
        }
        groups.retain(|group| !group.conditions.is_empty());
        log::trace!("compiled `{}` into {} rule groups", decl.name, groups.len());

        Ok(Self {
            name: decl.name.clone(),
            groups,
        })
    }

    /// Returns `true` if any rule group holds.
    #[inline]
    #[must_use]
    pub fn supported<E>(&self, environment: &E) -> bool
    where
        E: Environment + ?Sized,
    {
        self.groups.iter().any(|group| group.holds(environment))
    }

    /// The entities to enable at `version`.
    ///
    /// Every entity condition is listed. Gates contribute every entity they mention
    /// while `version` alone does not satisfy them.
    #[inline]
    #[must_use]
    pub fn required_entities(&self, version: ApiVersion) -> BTreeSet<String> {
        let mut entities = BTreeSet::new();
        for group in &self.groups {
            for condition in &group.conditions {
                if let Condition::Entity(name) = condition {
                    entities.insert(name.clone());
                }
            }
            if !group.gate.is_satisfied_by_version(version) {
                entities.extend(group.gate.mentioned_entities().into_iter().map(str::to_owned));
            }
        }
        entities
    }

    /// The feature flags that would each enable the capability, deduplicated in rule order.
    #[inline]
    #[must_use]
    pub fn required_flags(&self) -> Vec<&str> {
        let mut flags: Vec<&str> = Vec::new();
        for condition in self.groups.iter().flat_map(|group| &group.conditions) {
            if let Condition::Flag(name) = condition {
                if !flags.contains(&name.as_str()) {
                    flags.push(name);
                }
            }
        }
        flags
    }
}

/// Resolves the alternatives of one rule.
fn conditions_of(
    capability: &str,
    rule: &EnableRule,
    context: CompileContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<Condition> {
    let mut conditions = Vec::new();
    if let Some(version) = rule.version {
        conditions.push(Condition::Version(version));
    }
    if let Some(name) = rule.extension.as_deref() {
        match context.entities.canonical_entity(name) {
            Some(canonical) => conditions.push(Condition::Entity(canonical.to_owned())),
            None => diagnostics.record(Warning::UnresolvedDependency {
                owner: capability.to_owned(),
                entity: name.to_owned(),
            }),
        }
    }
    if let Some(flag) = rule.feature.as_deref() {
        let record = rule.record.as_deref();
        if let Some(condition) = flag_condition(capability, record, flag, context, diagnostics) {
            conditions.push(condition);
        }
    }
    if let Some(record) = rule.property.as_deref() {
        if let Some(condition) = property_condition(capability, record, rule, context, diagnostics) {
            conditions.push(condition);
        }
    }
    conditions
}

/// Checks that the flag exists in its record, if one is named.
fn flag_condition(
    capability: &str,
    record: Option<&str>,
    flag: &str,
    context: CompileContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<Condition> {
    if let Some(record) = record {
        let Some(declared) = context.records.record(record) else {
            diagnostics.record(Warning::UnknownRecord {
                capability: capability.to_owned(),
                record: record.to_owned(),
            });
            return None;
        };
        if !declared.flags().any(|known| known == flag) {
            diagnostics.record(Warning::UnknownFlag {
                capability: capability.to_owned(),
                record: record.to_owned(),
                flag: flag.to_owned(),
            });
            return None;
        }
    }
    Some(Condition::Flag(flag.to_owned()))
}

/// Resolves the record, member and test of a property rule.
fn property_condition(
    capability: &str,
    record: &str,
    rule: &EnableRule,
    context: CompileContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<Condition> {
    let Some(declared) = context.records.record(record) else {
        diagnostics.record(Warning::UnknownRecord {
            capability: capability.to_owned(),
            record: record.to_owned(),
        });
        return None;
    };
    let member = rule.member.as_deref().unwrap_or_default();
    if declared.member(member).is_none() {
        diagnostics.record(Warning::UnknownMember {
            capability: capability.to_owned(),
            record: record.to_owned(),
            member: member.to_owned(),
        });
        return None;
    }
    let value = rule.value.as_deref().unwrap_or_default();
    let test = match PropertyTest::parse(value, context.constants) {
        Ok(test) => test,
        Err(warning) => {
            diagnostics.record(with_capability(warning, capability));
            return None;
        }
    };

    let canonical = declared.canonical.as_str();
    let mut probes = vec![(canonical.to_owned(), member.to_owned())];
    for equivalent in context.equivalences.equivalents(canonical, member) {
        if !probes.contains(equivalent) {
            probes.push(equivalent.clone());
        }
    }
    Some(Condition::Property(PropertyCheck { probes, test }))
}

/// Fills in the capability of a warning raised while parsing a value.
fn with_capability(warning: Warning, capability: &str) -> Warning {
    match warning {
        Warning::UnknownConstant { constant, .. } => Warning::UnknownConstant {
            capability: capability.to_owned(),
            constant,
        },
        Warning::UnparsablePropertyValue { value, .. } => Warning::UnparsablePropertyValue {
            capability: capability.to_owned(),
            value,
        },
        other => other,
    }
}

/// An error indicating that a capability cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    /// A `requires` gate is malformed.
    #[error("malformed gate of `{capability}`: {source}")]
    Gate {
        /// The capability.
        capability: String,
        /// Source of the error.
        source: ParseDependsError,
    },
}
