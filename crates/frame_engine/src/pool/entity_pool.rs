//! Pools of whole entities
//!
//! A pooled entity stays in the registry while it sits in the free list:
//! inactive, with its components awoken but disabled, and hidden from
//! queries. Releasing it is validated immediately; the deactivation and
//! reset happen at the next phase boundary.

use std::collections::{HashMap, VecDeque};

use super::{PoolError, PoolStats};
use crate::core::ConfigurationError;
use crate::ecs::entity::{EntityBlueprint, EntityStatus, PoolMembership};
use crate::ecs::registry::{EntityRegistry, PendingOp};
use crate::foundation::collections::{EntityId, SlotMap};

slotmap::new_key_type! {
    /// Handle to a named entity pool
    pub struct EntityPoolId;
}

struct EntityPool {
    name: String,
    factory: Box<dyn FnMut() -> EntityBlueprint>,
    free: VecDeque<EntityId>,
    members: usize,
    stats: PoolStats,
}

/// Named entity pools
#[derive(Default)]
pub struct EntityPools {
    pools: SlotMap<EntityPoolId, EntityPool>,
    names: HashMap<String, EntityPoolId>,
}

impl EntityPools {
    /// Create an empty set of pools
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool built from `factory` and pre-warm it with `capacity`
    /// entities.
    pub fn register(
        &mut self,
        registry: &mut EntityRegistry,
        name: impl Into<String>,
        capacity: usize,
        factory: impl FnMut() -> EntityBlueprint + 'static,
    ) -> Result<EntityPoolId, ConfigurationError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(ConfigurationError::DuplicatePool(name));
        }
        let id = self.pools.insert(EntityPool {
            name: name.clone(),
            factory: Box::new(factory),
            free: VecDeque::with_capacity(capacity),
            members: 0,
            stats: PoolStats::default(),
        });
        self.names.insert(name.clone(), id);
        for _ in 0..capacity {
            self.spawn_member(registry, id, true);
        }
        log::debug!("registered entity pool '{}' with {} entities", name, capacity);
        Ok(id)
    }

    fn spawn_member(&mut self, registry: &mut EntityRegistry, id: EntityPoolId, in_pool: bool) -> Option<EntityId> {
        let pool = self.pools.get_mut(id)?;
        let mut blueprint = (pool.factory)();
        if in_pool {
            blueprint.active = false;
        }
        let entity = registry.create(blueprint);
        registry.set_pool_membership(entity, Some(PoolMembership { pool: id, in_pool }));
        if in_pool {
            pool.free.push_back(entity);
        }
        pool.members += 1;
        pool.stats.allocated += 1;
        Some(entity)
    }

    /// Look up a pool by name
    pub fn id(&self, name: &str) -> Option<EntityPoolId> {
        self.names.get(name).copied()
    }

    /// Name of a pool
    pub fn name(&self, pool: EntityPoolId) -> Option<&str> {
        self.pools.get(pool).map(|pool| pool.name.as_str())
    }

    /// Acquire an entity from the pool named `name`
    pub fn acquire(&mut self, registry: &mut EntityRegistry, name: &str) -> Result<EntityId, PoolError> {
        let id = self
            .id(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_owned()))?;
        self.acquire_from(registry, id)
    }

    /// Acquire an entity from `pool`.
    ///
    /// A released entity, already reset on release, is re-enabled at the
    /// next phase boundary; with an empty free list a fresh entity is spawned
    /// instead. Components can be configured right away.
    pub fn acquire_from(&mut self, registry: &mut EntityRegistry, id: EntityPoolId) -> Result<EntityId, PoolError> {
        let pool = self
            .pools
            .get_mut(id)
            .ok_or_else(|| PoolError::UnknownPool(format!("{id:?}")))?;

        while let Some(entity) = pool.free.pop_front() {
            let reusable = registry
                .get(entity)
                .is_some_and(|record| record.status() != EntityStatus::PendingDestroy);
            if !reusable {
                continue;
            }
            registry.set_pool_membership(entity, Some(PoolMembership { pool: id, in_pool: false }));
            registry.push_pending(PendingOp::ReviveFromPool(entity));
            pool.stats.acquired += 1;
            let in_use = pool.members - pool.free.len();
            pool.stats.peak_in_use = pool.stats.peak_in_use.max(in_use);
            return Ok(entity);
        }

        let entity = self
            .spawn_member(registry, id, false)
            .ok_or_else(|| PoolError::UnknownPool(format!("{id:?}")))?;
        if let Some(pool) = self.pools.get_mut(id) {
            pool.stats.acquired += 1;
            let in_use = pool.members - pool.free.len();
            pool.stats.peak_in_use = pool.stats.peak_in_use.max(in_use);
        }
        Ok(entity)
    }

    /// Release a pooled entity.
    ///
    /// Misuse is reported immediately; deactivation happens at the next
    /// phase boundary.
    pub fn release(&mut self, registry: &mut EntityRegistry, entity: EntityId) -> Result<(), PoolError> {
        let record = registry.get(entity).ok_or(PoolError::DestroyedEntity(entity))?;
        if record.status() == EntityStatus::PendingDestroy {
            return Err(PoolError::DestroyedEntity(entity));
        }
        let membership = record.pool().ok_or(PoolError::ForeignInstance)?;
        if !self.pools.contains_key(membership.pool) {
            return Err(PoolError::ForeignInstance);
        }
        if membership.in_pool {
            return Err(PoolError::DoubleRelease);
        }
        registry.set_pool_membership(
            entity,
            Some(PoolMembership {
                pool: membership.pool,
                in_pool: true,
            }),
        );
        registry.push_pending(PendingOp::ReturnToPool(entity));
        if let Some(pool) = self.pools.get_mut(membership.pool) {
            pool.stats.released += 1;
        }
        Ok(())
    }

    /// Put a deactivated entity back on its free list
    pub(crate) fn return_to_free(&mut self, pool: EntityPoolId, entity: EntityId) {
        if let Some(pool) = self.pools.get_mut(pool) {
            if !pool.free.contains(&entity) {
                pool.free.push_back(entity);
            }
        }
    }

    /// Forget an entity that has been drained from the registry
    pub(crate) fn forget(&mut self, pool: EntityPoolId, entity: EntityId) {
        if let Some(pool) = self.pools.get_mut(pool) {
            pool.free.retain(|id| *id != entity);
            pool.members = pool.members.saturating_sub(1);
        }
    }

    /// Entities owned by the pool, in use or free
    pub fn size(&self, pool: EntityPoolId) -> usize {
        self.pools.get(pool).map_or(0, |pool| pool.members)
    }

    /// Entities waiting in the free list
    pub fn available(&self, pool: EntityPoolId) -> usize {
        self.pools.get(pool).map_or(0, |pool| pool.free.len())
    }

    /// Usage counters of a pool
    pub fn stats(&self, pool: EntityPoolId) -> Option<PoolStats> {
        self.pools.get(pool).map(|pool| pool.stats)
    }

    /// Number of registered pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pool is registered
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Drop every pool. The registry must be torn down separately.
    pub fn clear(&mut self) {
        self.pools.clear();
        self.names.clear();
    }
}
