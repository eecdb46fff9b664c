//! # Resource Hooks Pipeline
//!
//! Applications attach business logic to resource lifecycles by registering a
//! [`ResourceHooks`] container per model type in a [`HookRegistry`]. The
//! [`HookExecutor`] walks the relationship tree of the entities each operation
//! touches and fires the registered hooks layer by layer.

mod container;
mod executor;
mod layer;
mod registry;

pub use container::{EntityDiff, HookContext, ResourceHook, ResourceHooks, ResourcePipeline};
pub use executor::HookExecutor;
pub use layer::{EntityTreeLayer, NodeInLayer, RelationshipGroup, VisitedSet};
pub use registry::{HookArgs, HookRegistry};
