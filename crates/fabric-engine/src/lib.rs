// Fabric orchestration engine
//
// Owns the process-wide resource registry, drives each resource's
// lifecycle state machine in dependency order, resolves requirements
// against the registry, and turns post-commit collection mutations into
// incremental reconciliation tasks. Concrete infrastructure types plug
// in through the `ResourceType` hook contract and never appear here.

mod lifecycle;
mod manager;
mod resource;
mod settings;
mod toposort;

pub use lifecycle::{
    ComposedType, CreatePolicy, HookCtx, ResourceSpec, ResourceState, ResourceType,
};
pub use manager::ResourceManager;
pub use resource::{DirtyOp, Mutation, Resource};
pub use settings::Settings;
