//! Entity records and blueprints

use std::any::TypeId;
use std::collections::HashMap;

use crate::ecs::component::Component;
use crate::foundation::collections::{ComponentId, EntityId};
use crate::pool::EntityPoolId;

/// Structural status of an entity inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    /// Created this phase; invisible until the next phase boundary
    Spawning,
    /// Assembled and visible to queries
    Live,
    /// Destroyed; disabled at the next boundary and removed at drain
    PendingDestroy,
}

/// Pool bookkeeping for entities created by an entity pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMembership {
    /// Owning pool
    pub pool: EntityPoolId,
    /// Whether the entity currently sits in the pool's free list
    pub in_pool: bool,
}

/// An entity and the ordered list of components it owns
#[derive(Debug)]
pub struct EntityRecord {
    pub(crate) name: String,
    pub(crate) tags: Vec<String>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) active: bool,
    pub(crate) status: EntityStatus,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) siblings: HashMap<TypeId, ComponentId>,
    pub(crate) pool: Option<PoolMembership>,
}

impl EntityRecord {
    pub(crate) fn new(name: String, tags: Vec<String>, parent: Option<EntityId>, active: bool) -> Self {
        Self {
            name,
            tags,
            parent,
            active,
            status: EntityStatus::Spawning,
            components: Vec::new(),
            siblings: HashMap::new(),
            pool: None,
        }
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags attached at creation
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Check if entity has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the entity is active (its components may be enabled)
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Structural status
    pub fn status(&self) -> EntityStatus {
        self.status
    }

    /// Components in insertion (= dispatch) order
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Pool membership, if the entity came from an entity pool
    pub fn pool(&self) -> Option<PoolMembership> {
        self.pool
    }

    /// Raw parent handle; use `EntityRegistry::parent` to resolve it
    pub fn parent_handle(&self) -> Option<EntityId> {
        self.parent
    }

    /// Pooled entities sitting in their free list are hidden from queries
    pub(crate) fn is_visible(&self) -> bool {
        self.status == EntityStatus::Live && !self.pool.is_some_and(|pool| pool.in_pool)
    }
}

/// Initial configuration of an entity, supplied by the application or the
/// asset pipeline at creation time.
pub struct EntityBlueprint {
    pub(crate) name: String,
    pub(crate) tags: Vec<String>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) active: bool,
    pub(crate) components: Vec<(Box<dyn Component>, bool)>,
}

impl EntityBlueprint {
    /// Start a blueprint for an active entity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            parent: None,
            active: true,
            components: Vec::new(),
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach to a parent (weak, non-owning)
    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Create the entity inactive; its components are awoken but not enabled
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Append an enabled component
    pub fn with_component<C: Component>(mut self, component: C) -> Self {
        self.components.push((Box::new(component), true));
        self
    }

    /// Append a component that starts disabled
    pub fn with_disabled_component<C: Component>(mut self, component: C) -> Self {
        self.components.push((Box::new(component), false));
        self
    }

    /// Append an already boxed component
    pub fn push_component(&mut self, component: Box<dyn Component>) {
        self.components.push((component, true));
    }

    /// Number of components in the blueprint
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for EntityBlueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBlueprint")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("active", &self.active)
            .field(
                "components",
                &self.components.iter().map(|(c, _)| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
