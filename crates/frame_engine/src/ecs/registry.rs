//! Entity registry
//!
//! Owns every entity and component. Structural changes requested while a
//! phase is running are queued and applied at serial points: lifecycle
//! changes at the next phase boundary, physical removal at the end-of-frame
//! drain. Handles are generational, so a drained entity can never be
//! confused with a newer one.

use std::any::TypeId;
use std::collections::VecDeque;

use crate::ecs::component::{downcast_mut, downcast_ref, Capabilities, Component};
use crate::ecs::entity::{EntityBlueprint, EntityRecord, EntityStatus, PoolMembership};
use crate::ecs::lifecycle::{LifecycleError, LifecycleState};
use crate::ecs::query::{ComponentQuery, EntityQuery, Query};
use crate::foundation::collections::{ComponentId, EntityId, SlotMap};
use crate::pool::EntityPoolId;

/// Storage slot of one component instance
pub(crate) struct ComponentSlot {
    pub(crate) entity: EntityId,
    pub(crate) name: &'static str,
    pub(crate) capabilities: Capabilities,
    pub(crate) state: LifecycleState,
    pub(crate) started: bool,
    pub(crate) wants_enabled: bool,
    pub(crate) doomed: bool,
    /// `None` while the component's own hook is running
    pub(crate) behaviour: Option<Box<dyn Component>>,
}

/// Structural change waiting for the next serial point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingOp {
    Spawned(EntityId),
    Attached(ComponentId),
    Destroy(EntityId),
    DestroyComponent(ComponentId),
    Enable(ComponentId),
    Disable(ComponentId),
    SetActive(EntityId, bool),
    ReturnToPool(EntityId),
    ReviveFromPool(EntityId),
}

/// Result of physically removing destroyed entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entities removed from storage
    pub entities_removed: usize,
    /// Components removed from storage
    pub components_removed: usize,
    /// Removed entities that belonged to an entity pool
    pub pooled_removed: Vec<(EntityPoolId, EntityId)>,
}

/// Owner of all entities and components
#[derive(Default)]
pub struct EntityRegistry {
    entities: SlotMap<EntityId, EntityRecord>,
    components: SlotMap<ComponentId, ComponentSlot>,
    order: Vec<EntityId>,
    pending: VecDeque<PendingOp>,
    doomed_entities: Vec<EntityId>,
    doomed_components: Vec<ComponentId>,
    awaiting_start: Vec<ComponentId>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity from a blueprint.
    ///
    /// The handle is valid immediately, but the entity is invisible to
    /// queries and dispatch until it is assembled at the next phase boundary.
    pub fn create(&mut self, blueprint: EntityBlueprint) -> EntityId {
        let entity = self.insert(blueprint);
        self.pending.push_back(PendingOp::Spawned(entity));
        entity
    }

    /// Attach a component to an existing entity.
    ///
    /// On a live entity the component is awoken and enabled at the next
    /// phase boundary.
    pub fn attach(
        &mut self,
        entity: EntityId,
        component: Box<dyn Component>,
    ) -> Result<ComponentId, LifecycleError> {
        let status = self
            .entities
            .get(entity)
            .map(|record| record.status)
            .ok_or(LifecycleError::UnknownEntity(entity))?;
        if status == EntityStatus::PendingDestroy {
            return Err(LifecycleError::UnknownEntity(entity));
        }
        let id = self.insert_component(entity, component, true);
        if status == EntityStatus::Live {
            self.pending.push_back(PendingOp::Attached(id));
        }
        Ok(id)
    }

    /// Mark an entity `PendingDestroy`.
    ///
    /// Its components leave the active set at the next phase boundary and
    /// storage is freed at the end-of-frame drain. Destroying twice is a
    /// no-op.
    pub fn destroy(&mut self, entity: EntityId) -> Result<(), LifecycleError> {
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(LifecycleError::UnknownEntity(entity))?;
        if record.status == EntityStatus::PendingDestroy {
            return Ok(());
        }
        record.status = EntityStatus::PendingDestroy;
        log::debug!("entity '{}' {:?} marked for destruction", record.name, entity);
        self.doomed_entities.push(entity);
        self.pending.push_back(PendingOp::Destroy(entity));
        Ok(())
    }

    /// Destroy a single component, leaving its entity alive
    pub fn destroy_component(&mut self, component: ComponentId) -> Result<(), LifecycleError> {
        let slot = self
            .components
            .get_mut(component)
            .ok_or(LifecycleError::UnknownComponent(component))?;
        if slot.doomed {
            return Ok(());
        }
        slot.doomed = true;
        self.doomed_components.push(component);
        self.pending.push_back(PendingOp::DestroyComponent(component));
        Ok(())
    }

    /// Queue enabling a component at the next phase boundary
    pub fn request_enable(&mut self, component: ComponentId) -> Result<(), LifecycleError> {
        self.ensure_component(component)?;
        self.pending.push_back(PendingOp::Enable(component));
        Ok(())
    }

    /// Queue disabling a component at the next phase boundary
    pub fn request_disable(&mut self, component: ComponentId) -> Result<(), LifecycleError> {
        self.ensure_component(component)?;
        self.pending.push_back(PendingOp::Disable(component));
        Ok(())
    }

    /// Queue activating or deactivating a whole entity
    pub fn request_set_active(&mut self, entity: EntityId, active: bool) -> Result<(), LifecycleError> {
        if !self.entities.contains_key(entity) {
            return Err(LifecycleError::UnknownEntity(entity));
        }
        self.pending.push_back(PendingOp::SetActive(entity, active));
        Ok(())
    }

    /// Snapshot of active components implementing `capability`, in
    /// entity insertion order then component insertion order
    pub fn for_each_active(&self, capability: Capabilities) -> ComponentQuery {
        let mut items = Vec::new();
        for &entity in &self.order {
            let Some(record) = self.entities.get(entity) else {
                continue;
            };
            if !record.active {
                continue;
            }
            items.extend(record.components.iter().copied().filter(|&id| {
                self.components.get(id).is_some_and(|slot| {
                    slot.state.is_dispatchable() && slot.capabilities.contains(capability)
                })
            }));
        }
        Query::new(items)
    }

    /// Snapshot of live entities carrying `tag`
    pub fn find_by_tag(&self, tag: &str) -> EntityQuery {
        Query::new(
            self.iter()
                .filter(|(_, record)| record.has_tag(tag))
                .map(|(id, _)| id)
                .collect(),
        )
    }

    /// Snapshot of live entities with at least one active component
    /// implementing `capability`
    pub fn find_by_capability(&self, capability: Capabilities) -> EntityQuery {
        Query::new(
            self.iter()
                .filter(|(_, record)| {
                    record.active
                        && record.components.iter().any(|&id| {
                            self.components.get(id).is_some_and(|slot| {
                                slot.state.is_dispatchable() && slot.capabilities.contains(capability)
                            })
                        })
                })
                .map(|(id, _)| id)
                .collect(),
        )
    }

    /// Snapshot of live entities whose parent is `parent`
    pub fn children(&self, parent: EntityId) -> EntityQuery {
        Query::new(
            self.iter()
                .filter(|(_, record)| record.parent == Some(parent))
                .map(|(id, _)| id)
                .collect(),
        )
    }

    /// Live entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> + '_ {
        self.order.iter().filter_map(move |&id| {
            self.entities
                .get(id)
                .filter(|record| record.is_visible())
                .map(|record| (id, record))
        })
    }

    /// Look up an entity record
    pub fn get(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities.get(entity)
    }

    /// Whether the handle refers to a stored entity
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live, visible entities
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether there are no live entities
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entities, including spawning and doomed ones
    pub fn stored_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of stored components
    pub fn stored_components(&self) -> usize {
        self.components.len()
    }

    /// Resolve an entity's parent. The reference is weak: once the parent
    /// has been drained this returns `None`.
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.entities
            .get(entity)?
            .parent
            .filter(|parent| self.entities.contains_key(*parent))
    }

    /// Lifecycle state of a component
    pub fn component_state(&self, component: ComponentId) -> Option<LifecycleState> {
        self.components.get(component).map(|slot| slot.state)
    }

    /// Entity owning a component
    pub fn component_owner(&self, component: ComponentId) -> Option<EntityId> {
        self.components.get(component).map(|slot| slot.entity)
    }

    /// Diagnostic name of a component
    pub fn component_name(&self, component: ComponentId) -> Option<&'static str> {
        self.components.get(component).map(|slot| slot.name)
    }

    /// Handle of the first component of type `T` on `entity`
    pub fn component_id<T: Component>(&self, entity: EntityId) -> Option<ComponentId> {
        self.entities
            .get(entity)?
            .siblings
            .get(&TypeId::of::<T>())
            .copied()
    }

    /// Borrow the first component of type `T` on `entity`
    pub fn component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let id = self.component_id::<T>(entity)?;
        let behaviour = self.components.get(id)?.behaviour.as_deref()?;
        downcast_ref::<T>(behaviour)
    }

    /// Mutably borrow the first component of type `T` on `entity`
    pub fn component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = self.component_id::<T>(entity)?;
        let behaviour = self.components.get_mut(id)?.behaviour.as_deref_mut()?;
        downcast_mut::<T>(behaviour)
    }

    /// Number of structural changes waiting for the next serial point
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Entities marked for destruction and not yet drained
    pub fn doomed_entities(&self) -> &[EntityId] {
        &self.doomed_entities
    }

    /// Physically remove everything marked for destruction.
    ///
    /// Destroy hooks must already have run; the dispatcher's drain does
    /// that before calling this.
    pub fn drain_pending(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        for entity in std::mem::take(&mut self.doomed_entities) {
            let Some(record) = self.entities.remove(entity) else {
                continue;
            };
            for id in &record.components {
                if self.components.remove(*id).is_some() {
                    report.components_removed += 1;
                }
            }
            if let Some(membership) = record.pool {
                report.pooled_removed.push((membership.pool, entity));
            }
            report.entities_removed += 1;
        }

        for id in std::mem::take(&mut self.doomed_components) {
            let Some(slot) = self.components.remove(id) else {
                continue;
            };
            if let Some(record) = self.entities.get_mut(slot.entity) {
                record.components.retain(|c| *c != id);
                record.siblings.retain(|_, c| *c != id);
            }
            report.components_removed += 1;
        }

        self.order.retain(|id| self.entities.contains_key(*id));
        self.awaiting_start.retain(|id| self.components.contains_key(*id));

        if report.entities_removed > 0 || report.components_removed > 0 {
            log::debug!(
                "drained {} entities, {} components",
                report.entities_removed,
                report.components_removed
            );
        }
        report
    }

    // Crate-internal plumbing used by the dispatcher and pools.

    pub(crate) fn insert(&mut self, blueprint: EntityBlueprint) -> EntityId {
        let EntityBlueprint {
            name,
            tags,
            parent,
            active,
            components,
        } = blueprint;
        let entity = self
            .entities
            .insert(EntityRecord::new(name, tags, parent, active));
        for (component, enabled) in components {
            self.insert_component(entity, component, enabled);
        }
        entity
    }

    fn insert_component(
        &mut self,
        entity: EntityId,
        behaviour: Box<dyn Component>,
        wants_enabled: bool,
    ) -> ComponentId {
        let type_id = behaviour.as_ref().as_any().type_id();
        let slot = ComponentSlot {
            entity,
            name: behaviour.name(),
            capabilities: behaviour.capabilities(),
            state: LifecycleState::Uninitialized,
            started: false,
            wants_enabled,
            doomed: false,
            behaviour: Some(behaviour),
        };
        let id = self.components.insert(slot);
        if let Some(record) = self.entities.get_mut(entity) {
            record.components.push(id);
            record.siblings.entry(type_id).or_insert(id);
        }
        id
    }

    fn ensure_component(&self, component: ComponentId) -> Result<(), LifecycleError> {
        if self.components.contains_key(component) {
            Ok(())
        } else {
            Err(LifecycleError::UnknownComponent(component))
        }
    }

    pub(crate) fn push_pending(&mut self, op: PendingOp) {
        self.pending.push_back(op);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingOp> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn record_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(entity)
    }

    pub(crate) fn slot(&self, component: ComponentId) -> Option<&ComponentSlot> {
        self.components.get(component)
    }

    pub(crate) fn slot_mut(&mut self, component: ComponentId) -> Option<&mut ComponentSlot> {
        self.components.get_mut(component)
    }

    pub(crate) fn components_of(&self, entity: EntityId) -> Vec<ComponentId> {
        self.entities
            .get(entity)
            .map(|record| record.components.clone())
            .unwrap_or_default()
    }

    pub(crate) fn doomed_components(&self) -> &[ComponentId] {
        &self.doomed_components
    }

    /// Move a spawning entity into the visible set
    pub(crate) fn mark_live(&mut self, entity: EntityId) -> bool {
        match self.entities.get_mut(entity) {
            Some(record) if record.status == EntityStatus::Spawning => {
                record.status = EntityStatus::Live;
                self.order.push(entity);
                true
            }
            _ => false,
        }
    }

    /// Remove an entity that failed assembly without running destroy hooks
    pub(crate) fn remove_unassembled(&mut self, entity: EntityId) {
        if let Some(record) = self.entities.remove(entity) {
            for id in record.components {
                self.components.remove(id);
            }
        }
        self.order.retain(|id| *id != entity);
        self.doomed_entities.retain(|id| *id != entity);
    }

    pub(crate) fn set_pool_membership(&mut self, entity: EntityId, membership: Option<PoolMembership>) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.pool = membership;
        }
    }

    pub(crate) fn take_behaviour(&mut self, component: ComponentId) -> Option<(EntityId, Box<dyn Component>)> {
        let slot = self.components.get_mut(component)?;
        let behaviour = slot.behaviour.take()?;
        Some((slot.entity, behaviour))
    }

    pub(crate) fn restore_behaviour(&mut self, component: ComponentId, behaviour: Box<dyn Component>) {
        if let Some(slot) = self.components.get_mut(component) {
            slot.behaviour = Some(behaviour);
        }
    }

    pub(crate) fn queue_start(&mut self, component: ComponentId) {
        if !self.awaiting_start.contains(&component) {
            self.awaiting_start.push(component);
        }
    }

    pub(crate) fn has_awaiting_start(&self) -> bool {
        !self.awaiting_start.is_empty()
    }

    pub(crate) fn take_awaiting_start(&mut self) -> Vec<ComponentId> {
        std::mem::take(&mut self.awaiting_start)
    }

    /// Every stored entity in insertion order, spawning ones last
    pub(crate) fn all_entities(&self) -> Vec<EntityId> {
        let mut ids = self.order.clone();
        ids.extend(self.entities.keys().filter(|id| !self.order.contains(id)));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Component for Probe {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }
    }

    struct Other;

    impl Component for Other {
        fn capabilities(&self) -> Capabilities {
            Capabilities::RENDER
        }
    }

    #[test]
    fn test_created_entity_is_invisible_until_live() {
        let mut registry = EntityRegistry::new();
        let entity = registry.create(EntityBlueprint::new("probe").with_component(Probe));
        assert!(registry.contains(entity));
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.pending_count(), 1);

        assert!(registry.mark_live(entity));
        assert_eq!(registry.len(), 1);
        assert!(!registry.mark_live(entity));
    }

    #[test]
    fn test_sibling_lookup_by_type() {
        let mut registry = EntityRegistry::new();
        let entity = registry.create(
            EntityBlueprint::new("pair")
                .with_component(Probe)
                .with_component(Other),
        );
        assert!(registry.component::<Probe>(entity).is_some());
        assert!(registry.component::<Other>(entity).is_some());
        let record = registry.get(entity).unwrap();
        assert_eq!(record.components().len(), 2);
        assert_eq!(registry.component_id::<Probe>(entity), Some(record.components()[0]));
    }

    #[test]
    fn test_destroy_is_deferred_and_idempotent() {
        let mut registry = EntityRegistry::new();
        let entity = registry.create(EntityBlueprint::new("doomed").with_component(Probe));
        registry.mark_live(entity);

        registry.destroy(entity).unwrap();
        registry.destroy(entity).unwrap();
        assert!(registry.contains(entity));
        assert_eq!(registry.get(entity).unwrap().status(), EntityStatus::PendingDestroy);
        assert_eq!(registry.doomed_entities().len(), 1);

        let report = registry.drain_pending();
        assert_eq!(report.entities_removed, 1);
        assert_eq!(report.components_removed, 1);
        assert!(!registry.contains(entity));
        assert!(registry.destroy(entity).is_err());
    }

    #[test]
    fn test_tag_query_is_a_snapshot() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(EntityBlueprint::new("a").with_tag("enemy"));
        let b = registry.create(EntityBlueprint::new("b").with_tag("enemy"));
        let c = registry.create(EntityBlueprint::new("c").with_tag("player"));
        for id in [a, b, c] {
            registry.mark_live(id);
        }

        let enemies = registry.find_by_tag("enemy");
        registry.destroy(a).unwrap();
        registry.drain_pending();

        assert_eq!(enemies.len(), 2);
        assert_eq!(enemies.iter().collect::<Vec<_>>(), vec![a, b]);
        // Restartable
        assert_eq!(enemies.iter().count(), 2);
        assert_eq!(registry.find_by_tag("enemy").len(), 1);
    }

    #[test]
    fn test_parent_is_weak() {
        let mut registry = EntityRegistry::new();
        let parent = registry.create(EntityBlueprint::new("parent"));
        let child = registry.create(EntityBlueprint::new("child").with_parent(parent));
        registry.mark_live(parent);
        registry.mark_live(child);
        assert_eq!(registry.parent(child), Some(parent));
        assert_eq!(registry.children(parent).first(), Some(child));

        registry.destroy(parent).unwrap();
        registry.drain_pending();
        assert!(registry.contains(child));
        assert_eq!(registry.parent(child), None);
    }

    #[test]
    fn test_attach_to_doomed_entity_rejected() {
        let mut registry = EntityRegistry::new();
        let entity = registry.create(EntityBlueprint::new("x"));
        registry.mark_live(entity);
        registry.destroy(entity).unwrap();
        assert!(registry.attach(entity, Box::new(Probe)).is_err());
    }

    #[test]
    fn test_destroy_single_component() {
        let mut registry = EntityRegistry::new();
        let entity = registry.create(
            EntityBlueprint::new("pair")
                .with_component(Probe)
                .with_component(Other),
        );
        registry.mark_live(entity);
        let probe = registry.component_id::<Probe>(entity).unwrap();
        registry.destroy_component(probe).unwrap();
        let report = registry.drain_pending();
        assert_eq!(report.components_removed, 1);
        assert!(registry.component::<Probe>(entity).is_none());
        assert!(registry.component::<Other>(entity).is_some());
        assert_eq!(registry.get(entity).unwrap().components().len(), 1);
    }
}
