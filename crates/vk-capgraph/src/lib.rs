//! Analysis core for Vulkan registry code generation.
//!
//! Turns registry records into the static decision tables a code emitter needs:
//! - [`depends`] resolves `depends`/`requires` expressions into OR-of-AND requirements
//! - [`alias`] canonicalizes record aliases and propagates owner and promotion metadata
//! - [`hierarchy`] orders redundant feature records into a preference forest
//! - [`predicate`] compiles SPIR-V enable rules into predicates over an [`environment::Environment`]
//!
//! Nothing here touches the filesystem or emits code. The pipeline assembling these parts
//! into a single graph lives in `vk-capgraph-build`.

#![expect(clippy::pub_use, reason = "part of public API")]

pub mod aggregate;
pub mod alias;
pub mod depends;
pub mod diagnostic;
pub mod entity;
pub mod environment;
pub mod hierarchy;
pub mod naming;
pub mod predicate;
pub mod registry;
pub mod version;

pub use version::ApiVersion;
