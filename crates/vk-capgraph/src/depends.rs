//! Resolver of dependency expressions such as the registry's `depends` and `requires` attributes.
//!
//! The grammar is a small boolean language over entity names and version literals:
//!
//! ```text
//! expr    := and ( ',' and )*        // ',' is OR
//! and     := primary ( '+' primary )*  // '+' is AND
//! primary := term | '(' expr ')'
//! ```
//!
//! Expressions are normalized into disjunctive normal form, an OR of AND-groups ([`Requirement`]).
//! A parenthesized sub-expression may appear at nesting depth 1 only,
//! which covers every form the registry uses (`(A+B),VK_VERSION_1_2` and `(A,VK_VERSION_1_1)+B`).
//! Anything nested deeper is rejected when resolving, never at query time.

use core::fmt::{self, Display};
use std::collections::{BTreeMap, HashMap};

use crate::{
    environment::EntitySet,
    version::{ApiVersion, ParseVersionError},
};

/// Maximum supported parenthesis nesting depth.
pub const MAX_NESTING_DEPTH: usize = 1;

/// Lookup from an entity name, as written in an expression, to its canonical identifier.
pub trait EntityLookup {
    /// Returns the canonical identifier for `name`, or [`None`] if the entity is unknown.
    fn canonical_entity(&self, name: &str) -> Option<&str>;
}

impl<S> EntityLookup for HashMap<String, String, S>
where
    S: core::hash::BuildHasher,
{
    #[inline]
    fn canonical_entity(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl EntityLookup for BTreeMap<String, String> {
    #[inline]
    fn canonical_entity(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A single atomic requirement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[expect(clippy::exhaustive_enums, reason = "the grammar has exactly these terms")]
pub enum Term {
    /// Satisfied when the core version is at least this version.
    Version(ApiVersion),
    /// Satisfied when the entity with this canonical identifier is enabled.
    Entity(String),
}

impl Term {
    /// Returns `true` if this term holds for the given version and enabled entities.
    #[inline]
    #[must_use]
    pub fn is_satisfied<E>(&self, version: ApiVersion, enabled: &E) -> bool
    where
        E: EntitySet + ?Sized,
    {
        match self {
            Self::Version(required) => version >= *required,
            Self::Entity(name) => enabled.contains_entity(name),
        }
    }
}

impl Display for Term {
    #[expect(
        clippy::min_ident_chars,
        reason = "It's a core library trait implementation"
    )]
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(version) => write!(f, "VK_VERSION_{}_{}", version.major, version.minor),
            Self::Entity(name) => f.write_str(name),
        }
    }
}

/// A set of terms that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct AndGroup {
    /// Deduplicated terms, in order of first appearance.
    terms: Vec<Term>,
}

impl AndGroup {
    /// Creates a group from terms, dropping duplicates.
    #[inline]
    #[must_use]
    pub fn new<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = Term>,
    {
        let mut group = Self::default();
        for term in terms {
            group.push(term);
        }
        group
    }

    /// Adds a term unless it is already present.
    fn push(&mut self, term: Term) {
        if !self.terms.contains(&term) {
            self.terms.push(term);
        }
    }

    /// The terms of this group.
    #[inline]
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Returns `true` if every term holds.
    #[inline]
    #[must_use]
    pub fn is_satisfied<E>(&self, version: ApiVersion, enabled: &E) -> bool
    where
        E: EntitySet + ?Sized,
    {
        self.terms
            .iter()
            .all(|term| term.is_satisfied(version, enabled))
    }

    /// Returns `true` if the group names no entity and all of its versions are met.
    #[inline]
    #[must_use]
    pub fn is_satisfied_by_version(&self, version: ApiVersion) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Version(required) => version >= *required,
            Term::Entity(_) => false,
        })
    }

    /// Returns `true` if all version terms are met, ignoring entity terms.
    fn versions_met(&self, version: ApiVersion) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Version(required) => version >= *required,
            Term::Entity(_) => true,
        })
    }

    /// The entity terms of this group.
    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match term {
            Term::Entity(name) => Some(name.as_str()),
            Term::Version(_) => None,
        })
    }

    /// Returns a copy with the terms in sorted order, used for comparing sets.
    fn sorted(&self) -> Self {
        let mut terms = self.terms.clone();
        terms.sort();
        Self { terms }
    }
}

/// A normalized requirement: AND-groups that are implicitly OR'ed.
///
/// An empty requirement has no dependencies and is always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct Requirement {
    /// Deduplicated groups, in order of first appearance.
    groups: Vec<AndGroup>,
}

impl Requirement {
    /// Creates a requirement from AND-groups, dropping empty and duplicate groups.
    #[inline]
    #[must_use]
    pub fn new<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = AndGroup>,
    {
        let mut requirement = Self::default();
        for group in groups {
            if !group.terms.is_empty() && !requirement.groups.contains(&group) {
                requirement.groups.push(group);
            }
        }
        requirement
    }

    /// The OR'ed AND-groups.
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[AndGroup] {
        &self.groups
    }

    /// Returns `true` if there are no dependencies at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns `true` if at least one AND-group is fully satisfied.
    /// An empty requirement is vacuously satisfied.
    #[inline]
    #[must_use]
    pub fn is_satisfied<E>(&self, version: ApiVersion, enabled: &E) -> bool
    where
        E: EntitySet + ?Sized,
    {
        self.groups.is_empty()
            || self
                .groups
                .iter()
                .any(|group| group.is_satisfied(version, enabled))
    }

    /// Returns `true` if the version alone satisfies the requirement.
    #[inline]
    #[must_use]
    pub fn is_satisfied_by_version(&self, version: ApiVersion) -> bool {
        self.groups.is_empty()
            || self
                .groups
                .iter()
                .any(|group| group.is_satisfied_by_version(version))
    }

    /// The entities that have to be enabled to satisfy the requirement at `version`.
    ///
    /// Empty if the version alone satisfies the requirement. Otherwise the entities of the first
    /// group whose version terms are met, falling back to the first group that names entities.
    #[inline]
    #[must_use]
    pub fn required_entities(&self, version: ApiVersion) -> Vec<&str> {
        if self.is_satisfied_by_version(version) {
            return Vec::new();
        }
        let named = |group: &&AndGroup| group.entities().next().is_some();
        self.groups
            .iter()
            .filter(named)
            .find(|group| group.versions_met(version))
            .or_else(|| self.groups.iter().find(named))
            .map(|group| group.entities().collect())
            .unwrap_or_default()
    }

    /// All entities named anywhere in the requirement, in order of first appearance.
    #[inline]
    #[must_use]
    pub fn mentioned_entities(&self) -> Vec<&str> {
        let mut entities: Vec<&str> = Vec::new();
        for entity in self.groups.iter().flat_map(AndGroup::entities) {
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        }
        entities
    }

    /// Returns `true` if both requirements have the same alternatives,
    /// regardless of the order groups and terms were written in.
    #[inline]
    #[must_use]
    pub fn same_alternatives(&self, other: &Self) -> bool {
        let sorted = |requirement: &Self| {
            let mut groups: Vec<AndGroup> =
                requirement.groups.iter().map(AndGroup::sorted).collect();
            groups.sort_by(|left, right| left.terms.cmp(&right.terms));
            groups
        };
        sorted(self) == sorted(other)
    }
}

impl Display for Requirement {
    #[expect(
        clippy::min_ident_chars,
        reason = "It's a core library trait implementation"
    )]
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group_index, group) in self.groups.iter().enumerate() {
            if group_index > 0 {
                f.write_str(",")?;
            }
            let parenthesize = group.terms.len() > 1 && self.groups.len() > 1;
            if parenthesize {
                f.write_str("(")?;
            }
            for (term_index, term) in group.terms.iter().enumerate() {
                if term_index > 0 {
                    f.write_str("+")?;
                }
                term.fmt(f)?;
            }
            if parenthesize {
                f.write_str(")")?;
            }
        }
        Ok(())
    }
}

/// The outcome of resolving an expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Resolution {
    /// The normalized requirement.
    pub requirement: Requirement,
    /// Entity names that were dropped because the lookup did not know them.
    pub unresolved: Vec<String>,
}

/// Parses and resolves a dependency expression.
///
/// Entity names unknown to `lookup` are dropped from their AND-group and reported
/// in [`Resolution::unresolved`]; a group left without terms is dropped entirely.
///
/// # Errors
///
/// Returns an error if the expression is structurally malformed:
/// unbalanced or too deeply nested parentheses, empty operands,
/// invalid terms or malformed version literals.
#[inline]
pub fn resolve<L>(expression: &str, lookup: &L) -> Result<Resolution, ParseDependsError>
where
    L: EntityLookup + ?Sized,
{
    if expression.trim().is_empty() {
        return Ok(Resolution::default());
    }

    let parser = Parser { expression };
    let tree = parser.parse_or(expression, 0)?;

    let mut unresolved = Vec::new();
    let mut groups = Vec::new();
    for atoms in tree.into_dnf() {
        let mut terms = Vec::with_capacity(atoms.len());
        for atom in atoms {
            match parser.classify(atom)? {
                Atom::Version(version) => terms.push(Term::Version(version)),
                Atom::Entity(name) => {
                    if let Some(canonical) = lookup.canonical_entity(name) {
                        terms.push(Term::Entity(canonical.to_owned()));
                    } else {
                        log::trace!("dropping unknown entity `{name}` from `{expression}`");
                        if !unresolved.iter().any(|known: &String| known == name) {
                            unresolved.push(name.to_owned());
                        }
                    }
                }
            }
        }
        groups.push(AndGroup::new(terms));
    }

    Ok(Resolution {
        requirement: Requirement::new(groups),
        unresolved,
    })
}

/// Parsed expression tree, before normalization.
enum Expr<'text> {
    /// Alternatives.
    Or(Vec<Expr<'text>>),
    /// Conjunction.
    And(Vec<Expr<'text>>),
    /// A single name or version literal.
    Atom(&'text str),
}

impl<'text> Expr<'text> {
    /// Distributes the tree into a list of AND-groups of atoms.
    fn into_dnf(self) -> Vec<Vec<&'text str>> {
        match self {
            Self::Atom(atom) => vec![vec![atom]],
            Self::Or(alternatives) => alternatives.into_iter().flat_map(Self::into_dnf).collect(),
            Self::And(operands) => {
                operands
                    .into_iter()
                    .fold(vec![Vec::new()], |accumulated, operand| {
                        let operand_groups = operand.into_dnf();
                        accumulated
                            .iter()
                            .flat_map(|prefix| {
                                operand_groups.iter().map(move |group| {
                                    let mut combined = prefix.clone();
                                    combined.extend(group.iter().copied());
                                    combined
                                })
                            })
                            .collect()
                    })
            }
        }
    }
}

/// A classified atom.
enum Atom<'text> {
    /// A version literal.
    Version(ApiVersion),
    /// An entity name, not yet resolved.
    Entity(&'text str),
}

/// Recursive descent over one expression, keeping it around for error context.
struct Parser<'text> {
    /// The whole expression.
    expression: &'text str,
}

impl<'text> Parser<'text> {
    /// `expr := and ( ',' and )*`
    fn parse_or(&self, text: &'text str, depth: usize) -> Result<Expr<'text>, ParseDependsError> {
        let parts = self.split_top_level(text, ',')?;
        let mut alternatives = parts
            .into_iter()
            .map(|part| self.parse_and(part, depth))
            .collect::<Result<Vec<_>, _>>()?;
        if alternatives.len() == 1 {
            if let Some(single) = alternatives.pop() {
                return Ok(single);
            }
        }
        Ok(Expr::Or(alternatives))
    }

    /// `and := primary ( '+' primary )*`
    fn parse_and(&self, text: &'text str, depth: usize) -> Result<Expr<'text>, ParseDependsError> {
        let parts = self.split_top_level(text, '+')?;
        let mut operands = parts
            .into_iter()
            .map(|part| self.parse_primary(part, depth))
            .collect::<Result<Vec<_>, _>>()?;
        if operands.len() == 1 {
            if let Some(single) = operands.pop() {
                return Ok(single);
            }
        }
        Ok(Expr::And(operands))
    }

    /// `primary := term | '(' expr ')'`
    fn parse_primary(
        &self,
        text: &'text str,
        depth: usize,
    ) -> Result<Expr<'text>, ParseDependsError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseDependsError::EmptyOperand {
                expression: self.expression.to_owned(),
            });
        }
        if let Some(inner) = Self::strip_enclosing(trimmed) {
            if depth >= MAX_NESTING_DEPTH {
                return Err(ParseDependsError::NestingTooDeep {
                    expression: self.expression.to_owned(),
                    max_depth: MAX_NESTING_DEPTH,
                });
            }
            return self.parse_or(inner, depth + 1);
        }
        if trimmed.contains(['(', ')']) {
            return Err(ParseDependsError::InvalidTerm {
                expression: self.expression.to_owned(),
                term: trimmed.to_owned(),
            });
        }
        Ok(Expr::Atom(trimmed))
    }

    /// Returns the inside of `text` if a single pair of parentheses encloses all of it.
    fn strip_enclosing(text: &str) -> Option<&str> {
        let inner = text.strip_prefix('(')?.strip_suffix(')')?;
        let mut depth = 0_usize;
        for character in inner.chars() {
            match character {
                '(' => depth += 1,
                ')' => {
                    // the opening parenthesis closes before the end, e.g. `(A)+(B)`
                    depth = depth.checked_sub(1)?;
                }
                _ => {}
            }
        }
        (depth == 0).then_some(inner)
    }

    /// Splits on `separator` outside of parentheses.
    fn split_top_level(
        &self,
        text: &'text str,
        separator: char,
    ) -> Result<Vec<&'text str>, ParseDependsError> {
        let unbalanced = || ParseDependsError::UnbalancedParentheses {
            expression: self.expression.to_owned(),
        };

        let mut parts = Vec::new();
        let mut depth = 0_usize;
        let mut start = 0;
        for (index, character) in text.char_indices() {
            match character {
                '(' => depth += 1,
                ')' => depth = depth.checked_sub(1).ok_or_else(unbalanced)?,
                _ if character == separator && depth == 0 => {
                    parts.push(text.get(start..index).ok_or_else(unbalanced)?);
                    start = index + character.len_utf8();
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(unbalanced());
        }
        parts.push(text.get(start..).ok_or_else(unbalanced)?);
        Ok(parts)
    }

    /// Classifies an atom by its lexical prefix.
    fn classify(&self, atom: &'text str) -> Result<Atom<'text>, ParseDependsError> {
        let looks_like_version = ApiVersion::has_version_prefix(atom)
            || atom.starts_with(|character: char| character.is_ascii_digit());
        if looks_like_version {
            return ApiVersion::parse(atom).map(Atom::Version).map_err(|source| {
                ParseDependsError::MalformedVersion {
                    expression: self.expression.to_owned(),
                    source,
                }
            });
        }
        if !atom
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_')
        {
            return Err(ParseDependsError::InvalidTerm {
                expression: self.expression.to_owned(),
                term: atom.to_owned(),
            });
        }
        Ok(Atom::Entity(atom))
    }
}

/// An error indicating that a dependency expression is structurally malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseDependsError {
    /// Parentheses do not pair up.
    #[error("unbalanced parentheses in `{expression}`")]
    UnbalancedParentheses {
        /// The whole expression.
        expression: String,
    },
    /// Parentheses are nested deeper than the OR-of-AND grammar allows.
    #[error("`{expression}` nests parentheses deeper than {max_depth} level(s)")]
    NestingTooDeep {
        /// The whole expression.
        expression: String,
        /// The maximum supported depth.
        max_depth: usize,
    },
    /// An operand of `,` or `+` is empty.
    #[error("empty operand in `{expression}`")]
    EmptyOperand {
        /// The whole expression.
        expression: String,
    },
    /// A term is neither an entity name nor a version literal.
    #[error("invalid term `{term}` in `{expression}`")]
    InvalidTerm {
        /// The whole expression.
        expression: String,
        /// The offending term.
        term: String,
    },
    /// A term has a version prefix but is not a version.
    #[error("malformed version in `{expression}`: {source}")]
    MalformedVersion {
        /// The whole expression.
        expression: String,
        /// Source of the error.
        source: ParseVersionError,
    },
}
