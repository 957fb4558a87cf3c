//! Builds the resolved capability graph of a Vulkan registry snapshot.
//!
//! A code emitter hands in a registry snapshot, already parsed from `vk.xml` into the
//! [`Registry`](capgraph::registry::Registry) shape, and receives a [`ResolvedGraph`] with every
//! decision table it needs:
//! which extensions to enable for a version, which feature struct to prefer,
//! and whether a device supports a SPIR-V capability.
//!
//! ```ignore
//! use vk_capgraph_build::{loader, ResolveConfig, ResolvedGraph};
//!
//! let registry = loader::registry_from_json(&snapshot)?;
//! let graph = ResolvedGraph::build(&registry, &ResolveConfig::default())?;
//! let extensions = graph.required_entities("Float16", ApiVersion::new(1, 1));
//! ```

#![expect(clippy::pub_use, reason = "part of public API")]

pub use vk_capgraph as capgraph;

pub use self::{
    config::ResolveConfig,
    graph::{BuildError, ResolvedGraph},
};

pub mod config;
pub mod graph;
pub mod loader;
pub mod merge;
