//! Component trait, capability flags and hook results
//!
//! Components are plain structs that implement [`Component`]. Behaviour is
//! composed rather than inherited: each component declares the capabilities
//! it implements and the dispatcher only calls the hooks of components that
//! declared the matching capability.

use std::any::{Any, TypeId};

use crate::ecs::context::HookContext;
use crate::foundation::math::Transform;

bitflags::bitflags! {
    /// Behavioural contracts a component may implement
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Receives `on_fixed_update` once per fixed step
        const FIXED_UPDATE = 1 << 0;
        /// Receives `on_update` once per frame
        const UPDATE = 1 << 1;
        /// Receives `on_late_update` once per frame, after every update
        const LATE_UPDATE = 1 << 2;
        /// Contributes a transform to the render snapshot
        const RENDER = 1 << 3;
        /// Restored through `reset_for_pool` when its entity is pooled
        const POOLABLE = 1 << 4;
    }
}

/// Failure reported by a lifecycle hook
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HookError {
    /// Generic failure with a message
    #[error("{0}")]
    Failed(String),

    /// A sibling the hook relies on is not present
    #[error("required sibling `{0}` is missing")]
    MissingSibling(&'static str),
}

impl HookError {
    /// Create a generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type returned by every hook
pub type HookResult = Result<(), HookError>;

/// A sibling component type another component cannot work without.
///
/// Dependencies are checked once when the entity is assembled; a missing one
/// is a configuration error and the entity is never activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    type_id: TypeId,
    name: &'static str,
}

impl Dependency {
    /// Declare a dependency on component type `T`
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type identifier of the required component
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name of the required component
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Upcasting helper so `dyn Component` can be downcast to its concrete type
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of behaviour attached to an entity.
///
/// Every hook has a no-op default, so a component only overrides what it
/// needs. Hook order for one component is fixed:
/// `on_awake` → `on_enable` → `on_start` → per-frame hooks → `on_disable` →
/// `on_destroy`, with enable/disable pairs repeating while the component
/// lives. A hook that returns an error moves the component to the faulted
/// state; it receives no further hooks.
pub trait Component: AsAny {
    /// Capabilities this component implements
    fn capabilities(&self) -> Capabilities;

    /// Name used in diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Sibling components that must be present on the same entity
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Called exactly once, when the entity is assembled
    fn on_awake(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called every time the component becomes enabled
    fn on_enable(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called once, before the first per-frame hook
    fn on_start(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Fixed-cadence hook, requires [`Capabilities::FIXED_UPDATE`]
    fn on_fixed_update(&mut self, _ctx: &mut HookContext<'_>, _fixed_delta: f32) -> HookResult {
        Ok(())
    }

    /// Per-frame hook, requires [`Capabilities::UPDATE`]
    fn on_update(&mut self, _ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        Ok(())
    }

    /// Per-frame hook after all updates, requires [`Capabilities::LATE_UPDATE`]
    fn on_late_update(&mut self, _ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        Ok(())
    }

    /// Called every time the component becomes disabled
    fn on_disable(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called once, when the entity is removed at the end-of-frame drain
    fn on_destroy(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Transform handed to the render collaborator, requires
    /// [`Capabilities::RENDER`]. `alpha` is the fraction of a fixed step
    /// left in the accumulator.
    fn render_transform(&self, _alpha: f32) -> Option<Transform> {
        None
    }

    /// Restore pool-default state, requires [`Capabilities::POOLABLE`]
    fn reset_for_pool(&mut self) {}
}

/// Downcast a component trait object to its concrete type
pub fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

/// Mutable variant of [`downcast_ref`]
pub fn downcast_mut<T: Component>(component: &mut dyn Component) -> Option<&mut T> {
    component.as_any_mut().downcast_mut::<T>()
}
