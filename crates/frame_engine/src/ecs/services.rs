//! Typed service locator
//!
//! Shared objects (object pools, game-wide state) live here instead of in
//! globals. Each service is keyed by its concrete type.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A long-lived object registered with the world
pub trait Service: Any {
    /// Called when the scheduler stops; release held resources here
    fn shutdown(&mut self) {}
}

struct ServiceEntry {
    name: &'static str,
    value: Box<dyn Any>,
    shutdown: fn(&mut dyn Any),
}

fn shutdown_as<S: Service>(value: &mut dyn Any) {
    if let Some(service) = value.downcast_mut::<S>() {
        service.shutdown();
    }
}

/// Registry of services keyed by type
#[derive(Default)]
pub struct ServiceRegistry {
    entries: HashMap<TypeId, ServiceEntry>,
    order: Vec<TypeId>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, returning the one it replaced
    pub fn insert<S: Service>(&mut self, service: S) -> Option<S> {
        let type_id = TypeId::of::<S>();
        let entry = ServiceEntry {
            name: std::any::type_name::<S>(),
            value: Box::new(service),
            shutdown: shutdown_as::<S>,
        };
        log::debug!("registered service {}", entry.name);
        match self.entries.insert(type_id, entry) {
            Some(previous) => previous.value.downcast::<S>().ok().map(|boxed| *boxed),
            None => {
                self.order.push(type_id);
                None
            }
        }
    }

    /// Borrow a service
    pub fn get<S: Service>(&self) -> Option<&S> {
        self.entries
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.value.downcast_ref::<S>())
    }

    /// Mutably borrow a service
    pub fn get_mut<S: Service>(&mut self) -> Option<&mut S> {
        self.entries
            .get_mut(&TypeId::of::<S>())
            .and_then(|entry| entry.value.downcast_mut::<S>())
    }

    /// Remove a service without shutting it down
    pub fn remove<S: Service>(&mut self) -> Option<S> {
        let type_id = TypeId::of::<S>();
        let entry = self.entries.remove(&type_id)?;
        self.order.retain(|id| *id != type_id);
        entry.value.downcast::<S>().ok().map(|boxed| *boxed)
    }

    /// Whether a service of type `S` is registered
    pub fn contains<S: Service>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no service is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shut every service down in reverse registration order and drop them
    pub fn shutdown_all(&mut self) {
        for type_id in self.order.drain(..).rev() {
            if let Some(mut entry) = self.entries.remove(&type_id) {
                log::debug!("shutting down service {}", entry.name);
                (entry.shutdown)(entry.value.as_mut());
            }
        }
    }
}
