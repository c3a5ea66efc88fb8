//! Collaborator interfaces
//!
//! Rendering, physics and input live outside the engine. The scheduler talks
//! to them through these traits only.

use std::collections::{HashMap, HashSet};

use crate::ecs::EntityRegistry;
use crate::events::topics;
use crate::foundation::collections::EntityId;
use crate::foundation::math::Transform;

/// One renderable entity in the render snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    /// Entity being drawn
    pub entity: EntityId,
    /// Transform after late update
    pub transform: Transform,
}

/// Read-only snapshot handed to the renderer once per frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    /// Scheduler frame index
    pub frame: u64,
    /// Interpolation factor between the previous and current fixed state
    pub alpha: f32,
    /// Whether the scheduler was paused when the frame was signalled
    pub paused: bool,
    /// Renderable entities in registry order
    pub entries: Vec<RenderEntry>,
}

impl RenderFrame {
    /// Look up the transform submitted for `entity`
    pub fn transform_of(&self, entity: EntityId) -> Option<&Transform> {
        self.entries
            .iter()
            .find(|entry| entry.entity == entity)
            .map(|entry| &entry.transform)
    }
}

/// Consumer of the render signal
pub trait RenderSink {
    /// Receive the snapshot for the frame just completed
    fn submit(&mut self, frame: &RenderFrame);
}

/// Kind of physics contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    /// Solid contact started
    CollisionEnter,
    /// Solid contact ended
    CollisionExit,
    /// Trigger overlap started
    TriggerEnter,
    /// Trigger overlap ended
    TriggerExit,
}

impl ContactKind {
    /// Reserved topic the contact is republished on
    pub fn topic(self) -> &'static str {
        match self {
            Self::CollisionEnter => topics::COLLISION_ENTER,
            Self::CollisionExit => topics::COLLISION_EXIT,
            Self::TriggerEnter => topics::TRIGGER_ENTER,
            Self::TriggerExit => topics::TRIGGER_EXIT,
        }
    }
}

/// Contact reported by the physics backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    /// What happened
    pub kind: ContactKind,
    /// First participant
    pub a: EntityId,
    /// Second participant
    pub b: EntityId,
}

impl ContactEvent {
    /// Create a contact
    pub fn new(kind: ContactKind, a: EntityId, b: EntityId) -> Self {
        Self { kind, a, b }
    }

    /// The participant that is not `entity`
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if self.a == entity {
            Some(self.b)
        } else if self.b == entity {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Physics simulation driven at the fixed cadence
pub trait PhysicsBackend {
    /// Advance one fixed step after fixed update and report contacts
    fn step(&mut self, fixed_delta: f32, registry: &EntityRegistry) -> Vec<ContactEvent>;
}

/// Per-frame input state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSample {
    axes: HashMap<String, f32>,
    pressed: HashSet<String>,
}

impl InputSample {
    /// Empty sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an analogue axis
    pub fn with_axis(mut self, name: impl Into<String>, value: f32) -> Self {
        self.axes.insert(name.into(), value);
        self
    }

    /// Mark a button as held
    pub fn with_pressed(mut self, name: impl Into<String>) -> Self {
        self.pressed.insert(name.into());
        self
    }

    /// Axis value, zero when absent
    pub fn axis(&self, name: &str) -> f32 {
        self.axes.get(name).copied().unwrap_or(0.0)
    }

    /// Whether a button is held
    pub fn is_pressed(&self, name: &str) -> bool {
        self.pressed.contains(name)
    }
}

/// Producer of input samples, polled once per frame before update
pub trait InputSource {
    /// Sample the current input state
    fn sample(&mut self) -> InputSample;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    #[test]
    fn test_contact_topics() {
        assert_eq!(ContactKind::CollisionEnter.topic(), "collision.enter");
        assert_eq!(ContactKind::TriggerExit.topic(), "trigger.exit");
    }

    #[test]
    fn test_contact_other() {
        let mut keys: SlotMap<EntityId, ()> = SlotMap::with_key();
        let (a, b, c) = (keys.insert(()), keys.insert(()), keys.insert(()));
        let contact = ContactEvent::new(ContactKind::TriggerEnter, a, b);
        assert_eq!(contact.other(a), Some(b));
        assert_eq!(contact.other(b), Some(a));
        assert_eq!(contact.other(c), None);
    }

    #[test]
    fn test_input_sample_defaults() {
        let sample = InputSample::new().with_axis("thrust", 0.5).with_pressed("fire");
        assert!((sample.axis("thrust") - 0.5).abs() < f32::EPSILON);
        assert!(sample.axis("missing").abs() < f32::EPSILON);
        assert!(sample.is_pressed("fire"));
        assert!(!sample.is_pressed("jump"));
    }
}
