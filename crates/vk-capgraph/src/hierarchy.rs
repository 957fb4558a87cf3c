//! Preference forest over records that extend the same base aggregate.
//!
//! Records are fingerprinted by the set of boolean flags they expose. A record whose fingerprint
//! strictly contains another one's is preferred over it: the contained record becomes its
//! descendant. Records with identical fingerprints are alternatives of one node.
//!
//! Priority, used for ordering alternatives and for visiting candidate parents:
//! 1. larger fingerprint first
//! 2. non-deprecated before deprecated
//! 3. newer owning entity (higher registry number) first
//! 4. identifier
//!
//! The forest depends only on the set of candidates, never on their input order.

use core::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostic::{Diagnostics, Warning};

/// A record considered for the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Candidate {
    /// Canonical identifier.
    pub name: String,
    /// Names of the boolean flags.
    pub fingerprint: BTreeSet<String>,
    /// Whether the owning entity is deprecated.
    pub deprecated: bool,
    /// Registry number of the owning entity, `0` for core records.
    pub recency: u32,
}

impl Candidate {
    /// Creates a candidate from its flags.
    #[inline]
    #[must_use]
    pub fn new<'flag, I>(name: &str, flags: I) -> Self
    where
        I: IntoIterator<Item = &'flag str>,
    {
        Self {
            name: name.to_owned(),
            fingerprint: flags.into_iter().map(str::to_owned).collect(),
            deprecated: false,
            recency: 0,
        }
    }

    /// Sets the deprecation and recency of the owning entity.
    #[inline]
    #[must_use]
    pub fn owned(mut self, deprecated: bool, recency: u32) -> Self {
        self.deprecated = deprecated;
        self.recency = recency;
        self
    }

    /// The tie-break among candidates of equal fingerprint size.
    fn tie_break(&self) -> (bool, Reverse<u32>, &str) {
        (self.deprecated, Reverse(self.recency), &self.name)
    }
}

/// A position in the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Node {
    /// Alternatives with identical fingerprints, in priority order.
    pub records: Vec<String>,
    /// The shared fingerprint.
    pub fingerprint: BTreeSet<String>,
    /// Nodes whose fingerprints are strict subsets of this one, in priority order.
    pub children: Vec<Node>,
}

impl Node {
    /// The preferred record of this node.
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &str {
        self.records.first().map_or("", String::as_str)
    }

    /// Evaluates the if/else-if chain rooted here.
    fn select<'node, P>(&'node self, predicate: &P, selected: &mut Vec<&'node str>)
    where
        P: Fn(&str) -> bool,
    {
        if let Some(record) = self.records.iter().find(|record| predicate(record)) {
            selected.push(record);
            return;
        }
        for child in &self.children {
            child.select(predicate, selected);
        }
    }

    /// Pushes this node and all its descendants, parents first.
    fn walk<'node>(&'node self, nodes: &mut Vec<&'node Self>) {
        nodes.push(self);
        for child in &self.children {
            child.walk(nodes);
        }
    }
}

/// The preference forest of one base aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Forest {
    /// The base aggregate, e.g. `VkPhysicalDeviceFeatures2`.
    pub base: String,
    /// Independent roots, in priority order.
    pub roots: Vec<Node>,
}

impl Forest {
    /// Builds the forest for `base`.
    ///
    /// Candidates without flags are left out. Pairs of nodes whose fingerprints overlap
    /// without one containing the other are reported to `diagnostics`.
    #[inline]
    pub fn build<I>(base: &str, candidates: I, diagnostics: &mut Diagnostics) -> Self
    where
        I: IntoIterator<Item = Candidate>,
    {
        let mut by_fingerprint: BTreeMap<BTreeSet<String>, Vec<Candidate>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for candidate in candidates {
            if candidate.fingerprint.is_empty() {
                log::trace!("`{}` has no flags, not part of the `{base}` forest", candidate.name);
                continue;
            }
            if !seen.insert(candidate.name.clone()) {
                log::debug!("ignoring duplicate candidate `{}`", candidate.name);
                continue;
            }
            by_fingerprint
                .entry(candidate.fingerprint.clone())
                .or_default()
                .push(candidate);
        }

        let mut classes: Vec<(BTreeSet<String>, Vec<Candidate>)> = by_fingerprint
            .into_iter()
            .map(|(fingerprint, mut members)| {
                members.sort_by(|left, right| left.tie_break().cmp(&right.tie_break()));
                (fingerprint, members)
            })
            .collect();
        classes.sort_by(|(left_fingerprint, left), (right_fingerprint, right)| {
            (
                Reverse(left_fingerprint.len()),
                left.first().map(Candidate::tie_break),
            )
                .cmp(&(
                    Reverse(right_fingerprint.len()),
                    right.first().map(Candidate::tie_break),
                ))
        });

        report_partial_overlaps(base, &classes, diagnostics);

        let order: Vec<usize> = (0..classes.len()).collect();
        let roots = assemble(&order, &classes);
        log::debug!(
            "`{base}` forest: {} records in {} classes under {} roots",
            seen.len(),
            classes.len(),
            roots.len()
        );
        Self {
            base: base.to_owned(),
            roots,
        }
    }

    /// Evaluates the forest against a support predicate.
    ///
    /// Every root is tested independently. Within a node the first supported alternative is
    /// selected. Children are only visited when no alternative of their parent is supported.
    #[inline]
    pub fn select<P>(&self, predicate: P) -> Vec<&str>
    where
        P: Fn(&str) -> bool,
    {
        let mut selected = Vec::new();
        for root in &self.roots {
            root.select(&predicate, &mut selected);
        }
        selected
    }

    /// All nodes, parents before their children.
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes = Vec::new();
        for root in &self.roots {
            root.walk(&mut nodes);
        }
        nodes
    }

    /// The node a record belongs to.
    #[inline]
    #[must_use]
    pub fn node_of(&self, record: &str) -> Option<&Node> {
        self.nodes()
            .into_iter()
            .find(|node| node.records.iter().any(|name| name == record))
    }

    /// Returns `true` if the forest has no nodes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Builds nodes from classes given in priority order.
///
/// Each class not yet placed becomes a node and claims every unplaced class
/// whose fingerprint it strictly contains. The claimed classes are arranged the same way below it.
fn assemble(order: &[usize], classes: &[(BTreeSet<String>, Vec<Candidate>)]) -> Vec<Node> {
    let mut placed = vec![false; order.len()];
    let mut nodes = Vec::new();
    for (position, class_index) in order.iter().copied().enumerate() {
        if placed.get(position).copied().unwrap_or(true) {
            continue;
        }
        let Some((fingerprint, members)) = classes.get(class_index) else {
            continue;
        };

        let mut claimed = Vec::new();
        for (later, other_index) in order.iter().copied().enumerate().skip(position + 1) {
            let Some((other, _)) = classes.get(other_index) else {
                continue;
            };
            let unplaced = placed.get(later).is_some_and(|done| !done);
            if unplaced && other.len() < fingerprint.len() && other.is_subset(fingerprint) {
                claimed.push(other_index);
                if let Some(done) = placed.get_mut(later) {
                    *done = true;
                }
            }
        }

        nodes.push(Node {
            records: members.iter().map(|member| member.name.clone()).collect(),
            fingerprint: fingerprint.clone(),
            children: assemble(&claimed, classes),
        });
    }
    nodes
}

/// Reports classes that share flags without either containing the other.
fn report_partial_overlaps(
    base: &str,
    classes: &[(BTreeSet<String>, Vec<Candidate>)],
    diagnostics: &mut Diagnostics,
) {
    for (index, (left, left_members)) in classes.iter().enumerate() {
        for (right, right_members) in classes.iter().skip(index + 1) {
            let overlaps = !left.is_disjoint(right);
            if overlaps && !left.is_subset(right) && !right.is_subset(left) {
                let name = |members: &[Candidate]| {
                    members
                        .first()
                        .map(|member| member.name.clone())
                        .unwrap_or_default()
                };
                diagnostics.record(Warning::PartialOverlap {
                    base: base.to_owned(),
                    left: name(left_members),
                    right: name(right_members),
                });
            }
        }
    }
}
