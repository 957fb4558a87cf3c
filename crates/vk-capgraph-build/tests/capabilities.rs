//! SPIR-V capability and extension queries against the fixture registry.

use std::collections::BTreeSet;

use vk_capgraph_build::{
    capgraph::{
        diagnostic::Warning,
        environment::{PropertyValue, StaticEnvironment},
        registry::{CapabilityDecl, EnableRule},
        ApiVersion,
    },
    BuildError, ResolveConfig, ResolvedGraph,
};
use vk_capgraph_test_utils::fixture_registry;

const V1_0: ApiVersion = ApiVersion::new(1, 0);
const V1_1: ApiVersion = ApiVersion::new(1, 1);
const V1_2: ApiVersion = ApiVersion::new(1, 2);

fn graph() -> ResolvedGraph {
    ResolvedGraph::build(&fixture_registry().unwrap(), &ResolveConfig::default()).unwrap()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[test_log::test]
fn names_are_sorted() {
    let graph = graph();
    assert_eq!(
        graph.capability_names().collect::<Vec<_>>(),
        [
            "AtomicFloat32AddEXT",
            "Float16",
            "GroupNonUniformArithmetic",
            "Int64Atomics",
            "Int8",
            "Shader",
            "SignedZeroInfNanPreserve",
            "StorageBuffer16BitAccess",
            "VulkanMemoryModel"
        ]
    );
    assert_eq!(
        graph.spirv_extension_names().collect::<Vec<_>>(),
        [
            "SPV_EXT_shader_atomic_float_add",
            "SPV_KHR_16bit_storage",
            "SPV_KHR_storage_buffer_storage_class",
            "SPV_KHR_vulkan_memory_model"
        ]
    );
}

#[test_log::test]
fn version_only_capability() {
    let graph = graph();
    assert!(graph.supported("Shader", &StaticEnvironment::new(V1_0)));
    assert!(graph.required_entities("Shader", V1_0).is_empty());
    assert!(graph.required_flags("Shader").is_empty());
}

#[test_log::test]
fn gated_feature_flag() {
    let graph = graph();
    let name = "StorageBuffer16BitAccess";

    let with_extension = StaticEnvironment::new(V1_0)
        .with_entity("VK_KHR_16bit_storage")
        .with_flag("storageBuffer16BitAccess");
    assert!(graph.supported(name, &with_extension));

    let flag_only = StaticEnvironment::new(V1_0).with_flag("storageBuffer16BitAccess");
    assert!(!graph.supported(name, &flag_only));

    let core = StaticEnvironment::new(V1_2).with_flag("storageBuffer16BitAccess");
    assert!(graph.supported(name, &core));
    assert!(!graph.supported(name, &StaticEnvironment::new(V1_2)));

    assert_eq!(graph.required_entities(name, V1_0), set(&["VK_KHR_16bit_storage"]));
    assert!(graph.required_entities(name, V1_1).is_empty());
    assert_eq!(graph.required_flags(name), ["storageBuffer16BitAccess"]);
}

#[test_log::test]
fn alternatives_across_gates_and_entities() {
    let graph = graph();

    let legacy = StaticEnvironment::new(V1_0).with_entity("VK_AMD_gpu_shader_half_float");
    assert!(graph.supported("Float16", &legacy));

    let extension = StaticEnvironment::new(V1_1)
        .with_entity("VK_KHR_shader_float16_int8")
        .with_flag("shaderFloat16");
    assert!(graph.supported("Float16", &extension));
    assert!(!graph.supported("Int8", &extension));

    assert_eq!(
        graph.required_entities("Float16", V1_0),
        set(&["VK_AMD_gpu_shader_half_float", "VK_KHR_shader_float16_int8"])
    );
    assert_eq!(
        graph.required_entities("Int8", V1_0),
        set(&["VK_KHR_shader_float16_int8"])
    );
    assert_eq!(graph.required_flags("Float16"), ["shaderFloat16"]);
}

#[test_log::test]
fn bitmask_property_probes_superseded_records() {
    let graph = graph();
    let name = "GroupNonUniformArithmetic";
    let arithmetic = PropertyValue::Integer(0b101);

    let legacy = StaticEnvironment::new(V1_1).with_property(
        "VkPhysicalDeviceSubgroupProperties",
        "supportedOperations",
        arithmetic,
    );
    assert!(graph.supported(name, &legacy));

    let aggregate = StaticEnvironment::new(V1_2).with_property(
        "VkPhysicalDeviceVulkan11Properties",
        "subgroupSupportedOperations",
        PropertyValue::Integer(0b11),
    );
    assert!(!graph.supported(name, &aggregate));

    let too_old = StaticEnvironment::new(V1_0).with_property(
        "VkPhysicalDeviceSubgroupProperties",
        "supportedOperations",
        arithmetic,
    );
    assert!(!graph.supported(name, &too_old));
    assert!(graph.required_entities(name, V1_0).is_empty());
}

#[test_log::test]
fn boolean_property_through_extension_record() {
    let graph = graph();
    let name = "SignedZeroInfNanPreserve";
    let environment = |value| {
        StaticEnvironment::new(V1_1)
            .with_entity("VK_KHR_shader_float_controls")
            .with_property(
                "VkPhysicalDeviceFloatControlsProperties",
                "shaderSignedZeroInfNanPreserveFloat16",
                PropertyValue::Bool(value),
            )
    };
    assert!(graph.supported(name, &environment(true)));
    assert!(!graph.supported(name, &environment(false)));
    assert!(graph.required_entities(name, V1_2).is_empty());
    assert_eq!(
        graph.required_entities(name, V1_1),
        set(&["VK_KHR_shader_float_controls"])
    );
}

#[test_log::test]
fn spirv_extensions() {
    let graph = graph();
    let name = "SPV_KHR_vulkan_memory_model";

    assert!(graph.spirv_extension_supported(name, &StaticEnvironment::new(V1_2)));
    assert!(!graph.spirv_extension_supported(name, &StaticEnvironment::new(V1_1)));
    assert!(graph.spirv_extension_supported(
        name,
        &StaticEnvironment::new(V1_1).with_entity("VK_KHR_vulkan_memory_model")
    ));
    assert_eq!(
        graph.spirv_extension_requirements(name, V1_1),
        set(&["VK_KHR_vulkan_memory_model"])
    );
    assert_eq!(
        graph.spirv_extension_requirements(name, V1_2),
        set(&["VK_KHR_vulkan_memory_model"])
    );
    assert_eq!(
        graph.spirv_extension_requirements("SPV_EXT_shader_atomic_float_add", V1_2),
        set(&["VK_EXT_shader_atomic_float"])
    );
}

#[test_log::test]
fn unknown_names_are_unsupported() {
    let graph = graph();
    let everything = StaticEnvironment::new(ApiVersion::new(1, 4)).with_flag("shaderFloat16");
    assert!(!graph.supported("RayQueryKHR", &everything));
    assert!(graph.required_entities("RayQueryKHR", V1_0).is_empty());
    assert!(graph.required_flags("RayQueryKHR").is_empty());
    assert!(!graph.spirv_extension_supported("SPV_KHR_ray_query", &everything));
    assert!(graph
        .spirv_extension_requirements("SPV_KHR_ray_query", V1_0)
        .is_empty());
}

#[test_log::test]
fn unknown_references_are_omitted() {
    let mut registry = fixture_registry().unwrap();
    registry.capabilities.push(CapabilityDecl::new(
        "RayQueryKHR",
        vec![
            EnableRule::feature("VkPhysicalDeviceRayQueryFeaturesKHR", "rayQuery")
                .requiring("VK_KHR_ray_query"),
            EnableRule::feature("VkPhysicalDeviceVulkan12Features", "rayQuery"),
        ],
    ));

    let graph = ResolvedGraph::build(&registry, &ResolveConfig::default()).unwrap();
    assert!(matches!(
        graph.warnings(),
        [
            Warning::UnresolvedDependency { .. },
            Warning::UnknownRecord { .. },
            Warning::UnknownFlag { .. }
        ]
    ));
    let capability = graph.capability("RayQueryKHR").unwrap();
    assert!(capability.groups.is_empty());
    let everything = StaticEnvironment::new(ApiVersion::new(1, 4)).with_flag("rayQuery");
    assert!(!graph.supported("RayQueryKHR", &everything));
}

#[test_log::test]
fn malformed_gates_and_duplicates_are_errors() {
    let config = ResolveConfig::default();

    let mut malformed = fixture_registry().unwrap();
    malformed.capabilities.push(CapabilityDecl::new(
        "Broken",
        vec![EnableRule::version(V1_0).requiring("VK_VERSION_1_1,")],
    ));
    let error = ResolvedGraph::build(&malformed, &config).unwrap_err();
    assert!(matches!(error, BuildError::Compile(_)));
    assert!(error.to_string().contains("Broken"));

    let mut duplicated = fixture_registry().unwrap();
    duplicated
        .spirv_extensions
        .push(CapabilityDecl::new("SPV_KHR_16bit_storage", Vec::new()));
    assert!(matches!(
        ResolvedGraph::build(&duplicated, &config),
        Err(BuildError::DuplicateCapability { capability }) if capability == "SPV_KHR_16bit_storage"
    ));
}
