//! Event bus
//!
//! Synchronous publish/subscribe keyed by string topics:
//! - Immediate fan-out in subscription order, no buffering or replay
//! - Subscriptions are owned by a component and invalidated when it disables
//! - Publishing to an invalidated handler drops the event for that handler
//!   and warns once per subscription

use std::collections::{HashMap, HashSet};

use crate::foundation::collections::{ComponentId, EntityId, SlotMap, SubscriptionId};
use crate::interfaces::ContactEvent;

/// Reserved topics used to republish physics contacts
pub mod topics {
    /// Two colliders started touching
    pub const COLLISION_ENTER: &str = "collision.enter";
    /// Two colliders stopped touching
    pub const COLLISION_EXIT: &str = "collision.exit";
    /// A collider entered a trigger volume
    pub const TRIGGER_ENTER: &str = "trigger.enter";
    /// A collider left a trigger volume
    pub const TRIGGER_EXIT: &str = "trigger.exit";

    /// Whether `topic` is owned by the engine
    pub fn is_reserved(topic: &str) -> bool {
        matches!(topic, COLLISION_ENTER | COLLISION_EXIT | TRIGGER_ENTER | TRIGGER_EXIT)
    }
}

/// Value carried by an event
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventPayload {
    /// No data
    #[default]
    None,
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text
    Text(String),
    /// Entity reference
    Entity(EntityId),
    /// Physics contact
    Contact(ContactEvent),
}

impl EventPayload {
    /// Integer payload, if present
    pub fn as_int(&self) -> Option<i64> {
        if let Self::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Float payload; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Boolean payload, if present
    pub fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Text payload, if present
    pub fn as_text(&self) -> Option<&str> {
        if let Self::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Entity payload, if present
    pub fn as_entity(&self) -> Option<EntityId> {
        if let Self::Entity(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Contact payload, if present
    pub fn as_contact(&self) -> Option<&ContactEvent> {
        if let Self::Contact(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

impl From<()> for EventPayload {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<bool> for EventPayload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for EventPayload {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for EventPayload {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for EventPayload {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for EventPayload {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for EventPayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for EventPayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<EntityId> for EventPayload {
    fn from(value: EntityId) -> Self {
        Self::Entity(value)
    }
}

impl From<ContactEvent> for EventPayload {
    fn from(value: ContactEvent) -> Self {
        Self::Contact(value)
    }
}

/// A published event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Topic the event was published on
    pub topic: String,
    /// Event data
    pub payload: EventPayload,
    /// Simulated time of publication (seconds)
    pub timestamp: f64,
}

/// Subscriber callback
pub type EventCallback = Box<dyn FnMut(&Event)>;

/// Errors raised by the event bus
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Subscriptions need a topic
    #[error("topic must not be empty")]
    EmptyTopic,

    /// The handle was never issued or has been removed
    #[error("unknown subscription {0:?}")]
    UnknownSubscription(SubscriptionId),
}

/// Cumulative bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Calls to `publish`
    pub published: u64,
    /// Callback invocations
    pub delivered: u64,
    /// Deliveries dropped because the subscription was invalidated
    pub skipped_stale: u64,
    /// Deliveries held back because the owner has not been enabled yet
    pub skipped_pending: u64,
}

/// Where a subscription sits relative to its owner's enabled window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Owner not enabled; goes live when it next enables
    Pending,
    /// Receives events
    Live,
    /// The enabled window it belonged to has closed
    Stale,
}

struct Subscription {
    topic: Option<String>,
    owner: Option<ComponentId>,
    callback: EventCallback,
    state: SubscriptionState,
    // Made outside an enabled window: follows every later window
    persistent: bool,
    warned: bool,
}

/// Synchronous topic-based event bus
#[derive(Default)]
pub struct EventBus {
    subscriptions: SlotMap<SubscriptionId, Subscription>,
    by_topic: HashMap<String, Vec<SubscriptionId>>,
    global: Vec<SubscriptionId>,
    enabled_owners: HashSet<ComponentId>,
    current_time: f64,
    stats: EventBusStats,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the timestamp stamped on published events
    pub fn update_time(&mut self, time: f64) {
        self.current_time = time;
    }

    /// Subscribe to one topic.
    ///
    /// Pass the owning component so the subscription follows its enabled
    /// window, or `None` for host-level subscribers that live until
    /// explicitly removed. A subscription made inside the owner's enabled
    /// window ends with that window. One made while the owner is not
    /// enabled stays pending until the next enable and then follows every
    /// later enabled window.
    pub fn subscribe(
        &mut self,
        topic: &str,
        owner: impl Into<Option<ComponentId>>,
        callback: impl FnMut(&Event) + 'static,
    ) -> Result<SubscriptionId, EventBusError> {
        if topic.is_empty() {
            return Err(EventBusError::EmptyTopic);
        }
        let id = self.insert(Some(topic.to_owned()), owner.into(), Box::new(callback));
        self.by_topic.entry(topic.to_owned()).or_default().push(id);
        Ok(id)
    }

    /// Subscribe to every topic. Global subscribers run after the topic's own
    /// subscribers.
    pub fn subscribe_global(
        &mut self,
        owner: impl Into<Option<ComponentId>>,
        callback: impl FnMut(&Event) + 'static,
    ) -> SubscriptionId {
        let id = self.insert(None, owner.into(), Box::new(callback));
        self.global.push(id);
        id
    }

    fn insert(&mut self, topic: Option<String>, owner: Option<ComponentId>, callback: EventCallback) -> SubscriptionId {
        let state = match owner {
            Some(owner) if !self.enabled_owners.contains(&owner) => SubscriptionState::Pending,
            _ => SubscriptionState::Live,
        };
        self.subscriptions.insert(Subscription {
            topic,
            owner,
            callback,
            state,
            persistent: state == SubscriptionState::Pending,
            warned: false,
        })
    }

    /// Remove a subscription
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), EventBusError> {
        let subscription = self
            .subscriptions
            .remove(id)
            .ok_or(EventBusError::UnknownSubscription(id))?;
        match subscription.topic {
            Some(topic) => {
                if let Some(ids) = self.by_topic.get_mut(&topic) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.by_topic.remove(&topic);
                    }
                }
            }
            None => self.global.retain(|other| *other != id),
        }
        Ok(())
    }

    /// Deliver an event to every subscriber of `topic`, in subscription
    /// order. Returns the number of callbacks invoked.
    pub fn publish(&mut self, topic: &str, payload: impl Into<EventPayload>) -> usize {
        let event = Event {
            topic: topic.to_owned(),
            payload: payload.into(),
            timestamp: self.current_time,
        };
        self.stats.published += 1;

        let mut targets = self.by_topic.get(topic).cloned().unwrap_or_default();
        targets.extend_from_slice(&self.global);

        let mut delivered = 0;
        for id in targets {
            let Some(subscription) = self.subscriptions.get_mut(id) else {
                continue;
            };
            match subscription.state {
                SubscriptionState::Live => {}
                SubscriptionState::Pending => {
                    self.stats.skipped_pending += 1;
                    continue;
                }
                SubscriptionState::Stale => {
                    self.stats.skipped_stale += 1;
                    if !subscription.warned {
                        subscription.warned = true;
                        log::warn!(
                            "dropping '{}' for stale subscription {:?} (owner {:?})",
                            event.topic,
                            id,
                            subscription.owner
                        );
                    }
                    continue;
                }
            }
            (subscription.callback)(&event);
            delivered += 1;
        }
        self.stats.delivered += delivered as u64;
        log::trace!("published '{}' to {} subscribers", topic, delivered);
        delivered
    }

    /// Open a new enabled window for `owner`. Subscriptions left stale by
    /// the previous window are dropped and pending ones go live. Called
    /// before the owner's enable hook runs.
    pub fn activate_owner(&mut self, owner: ComponentId) -> usize {
        self.enabled_owners.insert(owner);
        let stale: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, subscription)| {
                subscription.owner == Some(owner) && subscription.state == SubscriptionState::Stale
            })
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            // Ids were just collected from the map, removal cannot fail
            let _ = self.unsubscribe(id);
        }
        let mut activated = 0;
        for (_, subscription) in &mut self.subscriptions {
            if subscription.owner == Some(owner) && subscription.state == SubscriptionState::Pending {
                subscription.state = SubscriptionState::Live;
                activated += 1;
            }
        }
        activated
    }

    /// Close the enabled window of `owner`. Subscriptions made inside it
    /// go stale, the rest wait for the next window. Returns how many stopped
    /// receiving events.
    pub fn invalidate_owner(&mut self, owner: ComponentId) -> usize {
        self.enabled_owners.remove(&owner);
        let mut count = 0;
        for (_, subscription) in &mut self.subscriptions {
            if subscription.owner == Some(owner) && subscription.state == SubscriptionState::Live {
                subscription.state = if subscription.persistent {
                    SubscriptionState::Pending
                } else {
                    SubscriptionState::Stale
                };
                count += 1;
            }
        }
        count
    }

    /// Remove every subscription owned by `owner`. Called when the owner is
    /// destroyed.
    pub fn remove_owner(&mut self, owner: ComponentId) -> usize {
        self.enabled_owners.remove(&owner);
        let owned: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, subscription)| subscription.owner == Some(owner))
            .map(|(id, _)| id)
            .collect();
        for id in &owned {
            // Ids were just collected from the map, removal cannot fail
            let _ = self.unsubscribe(*id);
        }
        owned.len()
    }

    /// Whether the subscription exists and currently receives events
    pub fn is_valid(&self, id: SubscriptionId) -> bool {
        self.state(id) == Some(SubscriptionState::Live)
    }

    /// Window state of a subscription
    pub fn state(&self, id: SubscriptionId) -> Option<SubscriptionState> {
        self.subscriptions.get(id).map(|subscription| subscription.state)
    }

    /// Number of stored subscriptions, valid or not
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of subscriptions owned by `owner`
    pub fn owned_by(&self, owner: ComponentId) -> usize {
        self.subscriptions
            .values()
            .filter(|subscription| subscription.owner == Some(owner))
            .count()
    }

    /// Cumulative counters
    pub fn stats(&self) -> EventBusStats {
        self.stats
    }

    /// Remove every subscription
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.by_topic.clear();
        self.global.clear();
        self.enabled_owners.clear();
    }
}
