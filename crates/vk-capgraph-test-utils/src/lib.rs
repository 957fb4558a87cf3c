//! Shared fixtures for testing `vk-capgraph` crates.

use anyhow::Context as _;
use vk_capgraph::registry::Registry;

/// Feature aggregate of the fixture registry.
pub const FEATURES2: &str = "VkPhysicalDeviceFeatures2";
/// Property aggregate of the fixture registry.
pub const PROPERTIES2: &str = "VkPhysicalDeviceProperties2";

/// The fixture registry snapshot as JSON.
#[inline]
#[must_use]
pub const fn fixture_json() -> &'static str {
    include_str!("../fixtures/registry.json")
}

/// A small registry snapshot modelled on `vk.xml`: storage, float16/int8, descriptor indexing,
/// memory model and atomics extensions with their feature and property structs.
///
/// # Errors
///
/// Returns an error if the fixture does not deserialize.
#[inline]
pub fn fixture_registry() -> anyhow::Result<Registry> {
    serde_json::from_str(fixture_json()).context("deserializing the fixture registry")
}
