//! Generational identifiers and collection aliases
//!
//! Every handle handed out by the engine is a slot map key. Keys carry a
//! generation, so a handle to a drained entity or a removed subscription
//! never aliases a newer occupant of the same slot.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to an entity owned by the registry
    pub struct EntityId;

    /// Handle to a single component instance
    pub struct ComponentId;

    /// Handle to an event bus subscription
    pub struct SubscriptionId;

    /// Handle to an entry inside an object pool
    pub struct PoolKey;
}
