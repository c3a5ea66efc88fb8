//! Entity-Component implementation
//!
//! Entities own ordered lists of capability-tagged components. The
//! [`LifecycleDispatcher`] moves each component through its state machine
//! and calls its hooks; the [`EntityRegistry`] defers every structural
//! change to a serial point so phases always iterate a stable set.

pub mod component;
pub mod components;
pub mod context;
pub mod dispatcher;
pub mod entity;
pub mod lifecycle;
pub mod query;
pub mod registry;
pub mod resumable;
pub mod services;
pub mod world;

#[cfg(test)]
mod tests;

pub use component::{Capabilities, Component, Dependency, HookError, HookResult};
pub use context::HookContext;
pub use dispatcher::{DispatchStats, FaultRecord, HookKind, LifecycleDispatcher, Phase, PhaseReport};
pub use entity::{EntityBlueprint, EntityRecord, EntityStatus};
pub use lifecycle::{LifecycleError, LifecycleState};
pub use query::{ComponentQuery, EntityQuery, Query};
pub use registry::{DrainReport, EntityRegistry};
pub use services::{Service, ServiceRegistry};
pub use world::World;
