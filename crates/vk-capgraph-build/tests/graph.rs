//! Building the graph of the fixture registry: entities, records and forests.

use vk_capgraph_build::{
    capgraph::{
        diagnostic::Warning, hierarchy::Node, registry::EntityRecord, ApiVersion,
    },
    loader, BuildError, ResolveConfig, ResolvedGraph,
};
use vk_capgraph_test_utils::{fixture_json, fixture_registry, FEATURES2, PROPERTIES2};

const V1_0: ApiVersion = ApiVersion::new(1, 0);
const V1_1: ApiVersion = ApiVersion::new(1, 1);
const V1_2: ApiVersion = ApiVersion::new(1, 2);

fn graph() -> ResolvedGraph {
    ResolvedGraph::build(&fixture_registry().unwrap(), &ResolveConfig::default()).unwrap()
}

fn primaries(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(Node::primary).collect()
}

#[test_log::test]
fn fixture_is_consistent() {
    let graph = graph();
    assert_eq!(graph.warning_count(), 0, "{:?}", graph.warnings());
    assert_eq!(graph.header_version(), Some(309));
}

#[test_log::test]
fn loader_reads_the_fixture() {
    let registry = loader::registry_from_json(fixture_json()).unwrap();
    assert_eq!(registry, fixture_registry().unwrap());
}

#[test_log::test]
fn promoted_entity_needs_nothing_once_core() {
    let graph = graph();
    let indexing = graph.entity("VK_EXT_descriptor_indexing").unwrap();

    assert_eq!(
        indexing.required_entities(V1_0),
        ["VK_KHR_get_physical_device_properties2", "VK_KHR_maintenance3"]
    );
    assert!(indexing.required_entities(V1_1).is_empty());
    assert!(indexing.required_entities(V1_2).is_empty());
    assert!(indexing.is_core_at(V1_2));
    assert!(!indexing.is_core_at(V1_1));
}

#[test_log::test]
fn entity_satisfaction() {
    let graph = graph();
    assert!(graph.entity_satisfied(
        "VK_KHR_8bit_storage",
        V1_0,
        &["VK_KHR_get_physical_device_properties2", "VK_KHR_storage_buffer_storage_class"],
    ));
    assert!(!graph.entity_satisfied(
        "VK_KHR_8bit_storage",
        V1_1,
        &["VK_KHR_get_physical_device_properties2"],
    ));
    assert!(graph.entity_satisfied(
        "VK_KHR_8bit_storage",
        V1_1,
        &["VK_KHR_storage_buffer_storage_class"],
    ));
    assert!(!graph.entity_satisfied("VK_KHR_unknown", V1_2, &[]));
}

#[test_log::test]
fn closure_lists_dependencies_first() {
    let graph = graph();
    assert_eq!(
        graph.entity_closure(&["VK_EXT_descriptor_indexing"], V1_0),
        [
            "VK_KHR_get_physical_device_properties2",
            "VK_KHR_maintenance3",
            "VK_EXT_descriptor_indexing"
        ]
    );
    assert_eq!(
        graph.entity_closure(&["VK_KHR_16bit_storage", "VK_KHR_8bit_storage"], V1_0),
        [
            "VK_KHR_get_physical_device_properties2",
            "VK_KHR_storage_buffer_storage_class",
            "VK_KHR_16bit_storage",
            "VK_KHR_8bit_storage"
        ]
    );
}

#[test_log::test]
fn closure_skips_core_entities() {
    let graph = graph();
    assert_eq!(
        graph.entity_closure(&["VK_EXT_descriptor_indexing"], V1_1),
        ["VK_EXT_descriptor_indexing"]
    );
    assert_eq!(
        graph.entity_closure(&["VK_KHR_8bit_storage"], V1_1),
        ["VK_KHR_8bit_storage"]
    );
    assert!(graph
        .entity_closure(&["VK_KHR_8bit_storage", "VK_KHR_unknown"], V1_2)
        .is_empty());
}

#[test_log::test]
fn closure_survives_cycles() {
    let mut registry = fixture_registry().unwrap();
    let mut first = EntityRecord::new("VK_EXT_cycle_a", 900);
    first.depends = "VK_EXT_cycle_b".to_owned();
    let mut second = EntityRecord::new("VK_EXT_cycle_b", 901);
    second.depends = "VK_EXT_cycle_a".to_owned();
    registry.entities.extend([first, second]);

    let graph = ResolvedGraph::build(&registry, &ResolveConfig::default()).unwrap();
    assert_eq!(
        graph.entity_closure(&["VK_EXT_cycle_a"], V1_2),
        ["VK_EXT_cycle_b", "VK_EXT_cycle_a"]
    );
}

#[test_log::test]
fn aliases_share_canonical_metadata() {
    let graph = graph();
    let records = graph.records();

    assert_eq!(
        graph.canonical_record("VkPhysicalDeviceFloat16Int8FeaturesKHR"),
        Some("VkPhysicalDeviceShaderFloat16Int8Features")
    );
    let alias = records.record("VkPhysicalDevice16BitStorageFeaturesKHR").unwrap();
    assert_eq!(alias.core_version, Some(V1_1));
    assert_eq!(alias.members.len(), 6);

    let canonical = records.record("VkPhysicalDevicePushDescriptorProperties").unwrap();
    assert_eq!(canonical.entity.as_deref(), Some("VK_KHR_push_descriptor"));
    assert_eq!(canonical.core_version, Some(ApiVersion::new(1, 4)));
    assert_eq!(
        canonical.stype,
        "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_PUSH_DESCRIPTOR_PROPERTIES"
    );
    assert_eq!(
        records
            .record("VkPhysicalDevicePushDescriptorPropertiesKHR")
            .unwrap()
            .accessor_name(),
        "get_push_descriptor_properties_khr"
    );
}

#[test_log::test]
fn records_by_entity_and_version() {
    let graph = graph();
    assert_eq!(
        graph.records_of_entity("VK_KHR_shader_float16_int8"),
        [
            "VkPhysicalDeviceFloat16Int8FeaturesKHR",
            "VkPhysicalDeviceShaderFloat16Int8Features",
            "VkPhysicalDeviceShaderFloat16Int8FeaturesKHR"
        ]
    );
    assert!(graph.records_of_entity("VK_KHR_maintenance3").is_empty());

    assert_eq!(
        graph.records_at_version(FEATURES2, V1_1),
        ["VkPhysicalDevice16BitStorageFeatures"]
    );
    assert_eq!(
        graph.records_at_version(FEATURES2, V1_2),
        [
            "VkPhysicalDevice16BitStorageFeatures",
            "VkPhysicalDevice8BitStorageFeatures",
            "VkPhysicalDeviceDescriptorIndexingFeatures",
            "VkPhysicalDeviceShaderAtomicInt64Features",
            "VkPhysicalDeviceShaderFloat16Int8Features",
            "VkPhysicalDeviceVulkan11Features",
            "VkPhysicalDeviceVulkan12Features",
            "VkPhysicalDeviceVulkanMemoryModelFeatures"
        ]
    );
    assert_eq!(
        graph.records_at_version(PROPERTIES2, V1_1),
        ["VkPhysicalDeviceSubgroupProperties"]
    );
}

#[test_log::test]
fn feature_forest_prefers_aggregates() {
    let graph = graph();
    let forest = graph.forest(FEATURES2).unwrap();

    assert_eq!(
        primaries(&forest.roots),
        [
            "VkPhysicalDeviceVulkan12Features",
            "VkPhysicalDeviceVulkan11Features",
            "VkPhysicalDeviceShaderAtomicFloatFeaturesEXT"
        ]
    );
    let vulkan12 = forest.roots.first().unwrap();
    assert_eq!(
        primaries(&vulkan12.children),
        [
            "VkPhysicalDeviceDescriptorIndexingFeatures",
            "VkPhysicalDeviceVulkanMemoryModelFeatures",
            "VkPhysicalDevice8BitStorageFeatures",
            "VkPhysicalDeviceShaderAtomicInt64Features",
            "VkPhysicalDeviceShaderFloat16Int8Features"
        ]
    );
    let vulkan11 = forest.roots.get(1).unwrap();
    assert_eq!(
        primaries(&vulkan11.children),
        ["VkPhysicalDevice16BitStorageFeatures"]
    );
    assert!(forest.nodes().iter().all(|node| node.records.len() == 1));
}

#[test_log::test]
fn equal_fingerprints_become_alternatives() {
    let graph = graph();
    let forest = graph.forest(PROPERTIES2).unwrap();
    let node = forest.node_of("VkPhysicalDeviceVulkan12Properties").unwrap();
    assert_eq!(
        node.records,
        [
            "VkPhysicalDeviceFloatControlsProperties",
            "VkPhysicalDeviceVulkan12Properties"
        ]
    );
    assert!(forest
        .node_of("VkPhysicalDevicePushDescriptorProperties")
        .is_none());
}

#[test_log::test]
fn forest_selection_walks_the_chain() {
    let graph = graph();
    let forest = graph.forest(FEATURES2).unwrap();
    let available = [
        "VkPhysicalDeviceVulkan11Features",
        "VkPhysicalDevice16BitStorageFeatures",
        "VkPhysicalDeviceShaderFloat16Int8Features",
        "VkPhysicalDeviceShaderAtomicFloatFeaturesEXT",
    ];
    assert_eq!(
        forest.select(|record| available.contains(&record)),
        [
            "VkPhysicalDeviceShaderFloat16Int8Features",
            "VkPhysicalDeviceVulkan11Features",
            "VkPhysicalDeviceShaderAtomicFloatFeaturesEXT"
        ]
    );
}

#[test_log::test]
fn forests_ignore_declaration_order() {
    let registry = fixture_registry().unwrap();
    let mut reversed = registry.clone();
    reversed.entities.reverse();
    reversed.records.reverse();
    reversed.capabilities.reverse();
    let mut rotated = registry.clone();
    rotated.records.rotate_left(7);

    let config = ResolveConfig::default();
    let expected = ResolvedGraph::build(&registry, &config).unwrap();
    for permuted in [reversed, rotated] {
        let graph = ResolvedGraph::build(&permuted, &config).unwrap();
        assert_eq!(graph.forest(FEATURES2), expected.forest(FEATURES2));
        assert_eq!(graph.forest(PROPERTIES2), expected.forest(PROPERTIES2));
        assert_eq!(graph.records(), expected.records());
        assert_eq!(
            graph.capability("Float16"),
            expected.capability("Float16")
        );
    }
}

#[test_log::test]
fn extra_bases_get_forests() {
    let config = ResolveConfig::from_toml_str(r#"extra-hierarchy-bases = ["VkDeviceCreateInfo"]"#)
        .unwrap();
    let graph = ResolvedGraph::build(&fixture_registry().unwrap(), &config).unwrap();
    let create_info = graph.forest("VkDeviceCreateInfo").unwrap();
    assert_eq!(
        primaries(&create_info.roots),
        primaries(&graph.forest(FEATURES2).unwrap().roots)
    );
    assert!(graph.forest("VkImageFormatProperties2").is_none());
}

#[test_log::test]
fn superseded_property_records() {
    let graph = graph();
    let equivalences = graph.field_equivalences();
    assert_eq!(
        equivalences.superseded_by("VkPhysicalDeviceSubgroupProperties"),
        ["VkPhysicalDeviceVulkan11Properties"]
    );
    assert_eq!(
        equivalences.superseded_by("VkPhysicalDeviceFloatControlsProperties"),
        ["VkPhysicalDeviceVulkan12Properties"]
    );
    assert_eq!(
        equivalences.superseded_by("VkPhysicalDevicePushDescriptorProperties"),
        ["VkPhysicalDeviceVulkan14Properties"]
    );
    assert!(equivalences
        .superseded_by("VkPhysicalDeviceVulkan14Properties")
        .is_empty());
}

#[test_log::test]
fn unknown_dependencies_are_soft() {
    let mut registry = fixture_registry().unwrap();
    let mut orphan = EntityRecord::new("VK_EXT_orphan", 950);
    orphan.depends = "VK_KHR_maintenance3+VK_EXT_missing".to_owned();
    registry.entities.push(orphan);

    let graph = ResolvedGraph::build(&registry, &ResolveConfig::default()).unwrap();
    assert_eq!(graph.warning_count(), 1);
    assert!(matches!(
        graph.warnings(),
        [Warning::UnresolvedDependency { owner, entity }]
            if owner == "VK_EXT_orphan" && entity == "VK_EXT_missing"
    ));
    assert_eq!(
        graph.entity_closure(&["VK_EXT_orphan"], V1_0),
        [
            "VK_KHR_get_physical_device_properties2",
            "VK_KHR_maintenance3",
            "VK_EXT_orphan"
        ]
    );

    let mut strict = ResolveConfig::default();
    strict.deny_warnings = true;
    match ResolvedGraph::build(&registry, &strict) {
        Err(BuildError::Warnings { warnings }) => assert_eq!(warnings.len(), 1),
        other => panic!("expected denied warnings, got {other:?}"),
    }
}

#[test_log::test]
fn structural_errors_abort_the_build() {
    let config = ResolveConfig::default();

    let mut malformed = fixture_registry().unwrap();
    let mut broken = EntityRecord::new("VK_EXT_broken", 960);
    broken.depends = "(VK_KHR_maintenance3+".to_owned();
    malformed.entities.push(broken);
    let error = ResolvedGraph::build(&malformed, &config).unwrap_err();
    assert!(matches!(error, BuildError::Entity(_)));
    assert!(error.to_string().contains("VK_EXT_broken"));

    let mut duplicated = fixture_registry().unwrap();
    duplicated
        .entities
        .push(EntityRecord::new("VK_KHR_maintenance3", 169));
    assert!(matches!(
        ResolvedGraph::build(&duplicated, &config),
        Err(BuildError::DuplicateEntity { entity }) if entity == "VK_KHR_maintenance3"
    ));

    let mut cyclic = fixture_registry().unwrap();
    for record in &mut cyclic.records {
        if record.name == "VkPhysicalDevice8BitStorageFeatures" {
            record.alias = Some("VkPhysicalDevice8BitStorageFeaturesKHR".to_owned());
        }
    }
    assert!(matches!(
        ResolvedGraph::build(&cyclic, &config),
        Err(BuildError::Alias(_))
    ));
}
