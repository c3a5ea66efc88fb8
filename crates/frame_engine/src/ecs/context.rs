//! Context handed to every component hook

use crate::ecs::component::{Component, HookError};
use crate::ecs::entity::EntityBlueprint;
use crate::ecs::lifecycle::LifecycleError;
use crate::ecs::query::EntityQuery;
use crate::ecs::registry::EntityRegistry;
use crate::ecs::services::Service;
use crate::ecs::world::World;
use crate::events::{Event, EventBusError, EventPayload};
use crate::foundation::collections::{ComponentId, EntityId, SubscriptionId};
use crate::foundation::time::FrameTime;
use crate::interfaces::InputSample;
use crate::pool::PoolError;

/// What a hook may see and do.
///
/// Structural changes made through the context (spawn, destroy, enable,
/// disable, pool release) are deferred to the next phase boundary, so the
/// phase that is currently running keeps iterating a stable set.
pub struct HookContext<'w> {
    world: &'w mut World,
    entity: EntityId,
    component: ComponentId,
}

impl<'w> HookContext<'w> {
    pub(crate) fn new(world: &'w mut World, entity: EntityId, component: ComponentId) -> Self {
        Self {
            world,
            entity,
            component,
        }
    }

    /// Entity owning the component whose hook is running
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Component whose hook is running
    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Clock readings of the current frame
    pub fn time(&self) -> FrameTime {
        self.world.time
    }

    /// Input sampled for the current frame
    pub fn input(&self) -> &InputSample {
        &self.world.input
    }

    /// Read-only view of the registry
    pub fn registry(&self) -> &EntityRegistry {
        &self.world.registry
    }

    /// Borrow a sibling component by type
    pub fn sibling<T: Component>(&self) -> Option<&T> {
        self.world.registry.component::<T>(self.entity)
    }

    /// Mutably borrow a sibling component by type
    pub fn sibling_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.registry.component_mut::<T>(self.entity)
    }

    /// Borrow a sibling the hook cannot work without
    pub fn require_sibling<T: Component>(&self) -> Result<&T, HookError> {
        self.sibling::<T>()
            .ok_or(HookError::MissingSibling(std::any::type_name::<T>()))
    }

    /// Borrow a component of another entity
    pub fn component_of<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.world.registry.component::<T>(entity)
    }

    /// Mutably borrow a component of another entity
    pub fn component_of_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.world.registry.component_mut::<T>(entity)
    }

    /// Create an entity, visible from the next phase
    pub fn spawn(&mut self, blueprint: EntityBlueprint) -> EntityId {
        self.world.registry.create(blueprint)
    }

    /// Destroy an entity at the end of the frame
    pub fn destroy(&mut self, entity: EntityId) -> Result<(), LifecycleError> {
        self.world.registry.destroy(entity)
    }

    /// Destroy the entity owning this component
    pub fn destroy_self(&mut self) -> Result<(), LifecycleError> {
        self.world.registry.destroy(self.entity)
    }

    /// Enable a component at the next phase boundary
    pub fn enable(&mut self, component: ComponentId) -> Result<(), LifecycleError> {
        self.world.registry.request_enable(component)
    }

    /// Disable a component at the next phase boundary
    pub fn disable(&mut self, component: ComponentId) -> Result<(), LifecycleError> {
        self.world.registry.request_disable(component)
    }

    /// Activate or deactivate an entity at the next phase boundary
    pub fn set_entity_active(&mut self, entity: EntityId, active: bool) -> Result<(), LifecycleError> {
        self.world.registry.request_set_active(entity, active)
    }

    /// Publish an event synchronously. Returns the number of handlers called.
    pub fn publish(&mut self, topic: &str, payload: impl Into<EventPayload>) -> usize {
        self.world.events.publish(topic, payload)
    }

    /// Subscribe on behalf of this component. Events are only delivered
    /// while the component is enabled. Subscribing from `on_enable` or a
    /// per-frame hook lasts until the next disable; subscribing from
    /// `on_awake` lasts for the component's lifetime.
    pub fn subscribe(
        &mut self,
        topic: &str,
        callback: impl FnMut(&Event) + 'static,
    ) -> Result<SubscriptionId, EventBusError> {
        self.world.events.subscribe(topic, self.component, callback)
    }

    /// Remove a subscription
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> Result<(), EventBusError> {
        self.world.events.unsubscribe(subscription)
    }

    /// Borrow a service
    pub fn service<S: Service>(&self) -> Option<&S> {
        self.world.services.get::<S>()
    }

    /// Mutably borrow a service
    pub fn service_mut<S: Service>(&mut self) -> Option<&mut S> {
        self.world.services.get_mut::<S>()
    }

    /// Acquire an entity from a named pool
    pub fn acquire_pooled(&mut self, pool: &str) -> Result<EntityId, PoolError> {
        self.world.acquire_pooled(pool)
    }

    /// Return a pooled entity to its pool
    pub fn release_to_pool(&mut self, entity: EntityId) -> Result<(), PoolError> {
        self.world.release_to_pool(entity)
    }

    /// Snapshot of live entities carrying `tag`
    pub fn find_by_tag(&self, tag: &str) -> EntityQuery {
        self.world.registry.find_by_tag(tag)
    }
}
