//! # ensemble-core
//!
//! The composition engine: a class registry with hierarchy-aware merged
//! specifications, the `allowed_params` resolver, the constructor-time
//! graph builder, delayed-slot factories, and diagnostic tree rendering.
//!
//! Handles:
//! - **Registry**: Per-class parameter and containment declarations with
//!   invalidatable merge caching.
//! - **Resolve**: Transitive computation of the argument names a class's
//!   constructor accepts.
//! - **Build**: Partitioning a flat argument bag into an object tree,
//!   eager and delayed construction.
//! - **Instance**: Constructed composites, container records, and
//!   introspection.
//! - **Validate**: The pluggable single-parameter validation seam.
//! - **Render**: Indented containment-tree rendering for diagnostics.

pub mod build;
pub mod instance;
pub mod registry;
pub mod render;
pub mod resolve;
pub mod validate;
pub mod value;

pub use build::GraphBuilder;
pub use instance::{ContainerRecord, Instance, InstanceRef, SlotState};
pub use registry::{ClassDescriptor, Registry};
pub use validate::{ClassOracle, StandardValidator, Validator};
pub use value::{ArgMap, Value};
