//! World: everything hooks can reach
//!
//! Bundles the registry with the event bus, services, entity pools and the
//! current frame's input and timing. There is exactly one world per
//! scheduler and it is passed explicitly; nothing here is global.

use crate::core::ConfigurationError;
use crate::ecs::entity::EntityBlueprint;
use crate::ecs::registry::EntityRegistry;
use crate::ecs::services::{Service, ServiceRegistry};
use crate::events::EventBus;
use crate::foundation::collections::EntityId;
use crate::foundation::time::FrameTime;
use crate::interfaces::InputSample;
use crate::pool::{EntityPoolId, EntityPools, PoolError};

/// Shared simulation state
#[derive(Default)]
pub struct World {
    pub(crate) registry: EntityRegistry,
    pub(crate) events: EventBus,
    pub(crate) services: ServiceRegistry,
    pub(crate) pools: EntityPools,
    pub(crate) input: InputSample,
    pub(crate) time: FrameTime,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity registry
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Mutable entity registry
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Mutable event bus
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Service registry
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Mutable service registry
    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    /// Entity pools
    pub fn pools(&self) -> &EntityPools {
        &self.pools
    }

    /// Input sampled for the current frame
    pub fn input(&self) -> &InputSample {
        &self.input
    }

    /// Replace the current input sample
    pub fn set_input(&mut self, input: InputSample) {
        self.input = input;
    }

    /// Clock readings of the current frame
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Create an entity; it becomes visible at the next phase boundary
    pub fn spawn(&mut self, blueprint: EntityBlueprint) -> EntityId {
        self.registry.create(blueprint)
    }

    /// Register a service
    pub fn insert_service<S: Service>(&mut self, service: S) -> Option<S> {
        self.services.insert(service)
    }

    /// Register a named entity pool pre-warmed with `capacity` entities
    pub fn register_pool(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
        factory: impl FnMut() -> EntityBlueprint + 'static,
    ) -> Result<EntityPoolId, ConfigurationError> {
        self.pools.register(&mut self.registry, name, capacity, factory)
    }

    /// Acquire an entity from a named pool
    pub fn acquire_pooled(&mut self, pool: &str) -> Result<EntityId, PoolError> {
        self.pools.acquire(&mut self.registry, pool)
    }

    /// Return a pooled entity to its pool
    pub fn release_to_pool(&mut self, entity: EntityId) -> Result<(), PoolError> {
        self.pools.release(&mut self.registry, entity)
    }

    /// Drop every entity, subscription, pool and service
    pub(crate) fn clear(&mut self) {
        self.services.shutdown_all();
        self.pools.clear();
        self.events.clear();
        self.registry = EntityRegistry::new();
        self.input = InputSample::default();
        self.time = FrameTime::default();
    }
}
