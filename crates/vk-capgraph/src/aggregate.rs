//! Equivalent members of property records and the core aggregates that superseded them.
//!
//! `VkPhysicalDeviceVulkan11Properties` aggregates, among others, the members of
//! `VkPhysicalDeviceSubgroupProperties`, renaming `supportedOperations` to
//! `subgroupSupportedOperations`. A device may populate only one of them, so property tests
//! probe every equivalent member.

use std::collections::BTreeMap;

use crate::{alias::NormalizedRecord, registry::Member};

/// Name prefixes aggregates add to avoid collisions.
const AGGREGATE_PREFIXES: [&str; 2] = ["subgroup", "vulkan"];

/// A `(record, member)` pair.
pub type Field = (String, String);

/// Equivalent fields between property records and the aggregates that superseded them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct FieldEquivalences {
    /// Field to its equivalents, in both directions.
    equivalents: BTreeMap<Field, Vec<Field>>,
    /// Superseded record to its aggregates.
    superseded: BTreeMap<String, Vec<String>>,
}

impl FieldEquivalences {
    /// Matches the canonical records extending `base` against its core aggregates.
    ///
    /// An aggregate is a core record without owning entity. A record is superseded by an
    /// aggregate with more members if each of its members has an equivalent there.
    #[inline]
    pub fn build<'record, I>(base: &str, records: I) -> Self
    where
        I: IntoIterator<Item = &'record NormalizedRecord>,
    {
        let candidates: Vec<&NormalizedRecord> = records
            .into_iter()
            .filter(|record| record.is_canonical() && record.extends(base))
            .collect();
        let aggregates: Vec<&NormalizedRecord> = candidates
            .iter()
            .copied()
            .filter(|record| record.core_version.is_some() && record.entity.is_none())
            .collect();

        let mut equivalences = Self::default();
        for record in &candidates {
            let own = payload(record);
            if own.is_empty() {
                continue;
            }
            for aggregate in &aggregates {
                let theirs = payload(aggregate);
                if aggregate.name == record.name || theirs.len() <= own.len() {
                    continue;
                }
                let Some(pairs) = own
                    .iter()
                    .map(|member| Some((*member, best_match(member, &theirs)?)))
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                log::trace!("`{}` is superseded by `{}`", record.name, aggregate.name);
                for (member, equivalent) in pairs {
                    equivalences.link(
                        (record.name.clone(), member.name.clone()),
                        (aggregate.name.clone(), equivalent.name.clone()),
                    );
                }
                equivalences
                    .superseded
                    .entry(record.name.clone())
                    .or_default()
                    .push(aggregate.name.clone());
            }
        }
        log::debug!(
            "{} records extending `{base}` are superseded by core aggregates",
            equivalences.superseded.len()
        );
        equivalences
    }

    /// Records both directions of an equivalence.
    fn link(&mut self, field: Field, equivalent: Field) {
        let forward = self.equivalents.entry(field.clone()).or_default();
        if !forward.contains(&equivalent) {
            forward.push(equivalent.clone());
        }
        let backward = self.equivalents.entry(equivalent).or_default();
        if !backward.contains(&field) {
            backward.push(field);
        }
    }

    /// Fields equivalent to `record.member`, excluding itself.
    #[inline]
    #[must_use]
    pub fn equivalents(&self, record: &str, member: &str) -> &[Field] {
        self.equivalents
            .get(&(record.to_owned(), member.to_owned()))
            .map_or(&[], Vec::as_slice)
    }

    /// The aggregates that superseded `record`.
    #[inline]
    #[must_use]
    pub fn superseded_by(&self, record: &str) -> &[String] {
        self.superseded.get(record).map_or(&[], Vec::as_slice)
    }
}

/// Members other than the chain header.
fn payload(record: &NormalizedRecord) -> Vec<&Member> {
    record
        .members
        .iter()
        .filter(|member| !member.is_chain_header())
        .collect()
}

/// The equivalent of `member` among `candidates`, preferring an exact name match.
fn best_match<'member>(member: &Member, candidates: &[&'member Member]) -> Option<&'member Member> {
    let same_type = || candidates.iter().copied().filter(|other| other.ty == member.ty);
    same_type()
        .find(|other| other.name.eq_ignore_ascii_case(&member.name))
        .or_else(|| same_type().find(|other| names_equivalent(&member.name, &other.name)))
}

/// Returns `true` if two member names denote the same field,
/// ignoring case, a distinguishing prefix, or an aggregate prefix.
#[inline]
#[must_use]
pub fn names_equivalent(left: &str, right: &str) -> bool {
    let left = left.to_ascii_lowercase();
    let right = right.to_ascii_lowercase();
    if left == right || left.ends_with(&right) || right.ends_with(&left) {
        return true;
    }
    let strip = |name: &str| -> String {
        AGGREGATE_PREFIXES
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
            .unwrap_or(name)
            .to_owned()
    };
    strip(&left) == strip(&right)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        alias::AliasTable, diagnostic::Diagnostics, registry::RecordDecl, version::ApiVersion,
    };

    const PROPERTIES2: &str = "VkPhysicalDeviceProperties2";

    fn records() -> AliasTable {
        let mut subgroup = RecordDecl::new("VkPhysicalDeviceSubgroupProperties", PROPERTIES2);
        subgroup.core_version = Some(ApiVersion::new(1, 1));
        subgroup.members = vec![
            Member::new("VkStructureType", "sType"),
            Member::new("void*", "pNext"),
            Member::new("uint32_t", "subgroupSize"),
            Member::new("VkShaderStageFlags", "supportedStages"),
            Member::new("VkSubgroupFeatureFlags", "supportedOperations"),
            Member::flag("quadOperationsInAllStages"),
        ];

        let mut vulkan11 = RecordDecl::new("VkPhysicalDeviceVulkan11Properties", PROPERTIES2);
        vulkan11.core_version = Some(ApiVersion::new(1, 2));
        vulkan11.members = vec![
            Member::new("VkStructureType", "sType"),
            Member::new("void*", "pNext"),
            Member::new("uint32_t", "subgroupSize"),
            Member::new("VkShaderStageFlags", "subgroupSupportedStages"),
            Member::new("VkSubgroupFeatureFlags", "subgroupSupportedOperations"),
            Member::flag("subgroupQuadOperationsInAllStages"),
            Member::new("uint32_t", "maxMultiviewViewCount"),
        ];

        let mut multiview = RecordDecl::new("VkPhysicalDeviceMultiviewProperties", PROPERTIES2);
        multiview.entity = Some("VK_KHR_multiview".to_owned());
        multiview.members = vec![
            Member::new("uint32_t", "maxMultiviewViewCount"),
            Member::new("uint32_t", "maxMultiviewInstanceIndex"),
        ];

        AliasTable::normalize(&[subgroup, vulkan11, multiview], &[], &mut Diagnostics::default())
            .unwrap()
    }

    #[test_log::test]
    fn superseded_members_map_both_ways() {
        let table = records();
        let equivalences = FieldEquivalences::build(PROPERTIES2, table.records());

        assert_eq!(
            equivalences.superseded_by("VkPhysicalDeviceSubgroupProperties"),
            ["VkPhysicalDeviceVulkan11Properties"]
        );
        assert_eq!(
            equivalences.equivalents("VkPhysicalDeviceSubgroupProperties", "supportedOperations"),
            [(
                "VkPhysicalDeviceVulkan11Properties".to_owned(),
                "subgroupSupportedOperations".to_owned()
            )]
        );
        assert_eq!(
            equivalences.equivalents("VkPhysicalDeviceVulkan11Properties", "subgroupSize"),
            [(
                "VkPhysicalDeviceSubgroupProperties".to_owned(),
                "subgroupSize".to_owned()
            )]
        );
    }

    #[test_log::test]
    fn partially_covered_records_are_not_superseded() {
        let table = records();
        let equivalences = FieldEquivalences::build(PROPERTIES2, table.records());
        assert!(equivalences
            .superseded_by("VkPhysicalDeviceMultiviewProperties")
            .is_empty());
        assert!(equivalences
            .equivalents("VkPhysicalDeviceMultiviewProperties", "maxMultiviewViewCount")
            .is_empty());
    }

    #[test_log::test]
    fn name_equivalence() {
        assert!(names_equivalent("supportedOperations", "subgroupSupportedOperations"));
        assert!(names_equivalent("SubgroupSize", "subgroupSize"));
        assert!(names_equivalent("vulkanMemoryModel", "subgroupMemoryModel"));
        assert!(!names_equivalent("maxPushDescriptors", "maxPerStageResources"));
    }
}
