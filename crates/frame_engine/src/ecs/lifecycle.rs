//! Per-component lifecycle state machine
//!
//! ```text
//! Uninitialized -> Awoken -> Enabled -> Active -> Disabled -> Destroyed
//!                               ^                    |
//!                               +--------------------+
//! ```
//!
//! `Faulted` can be entered from any live state when a hook fails. It is
//! excluded from dispatch like `Disabled` but can never be re-enabled.

use crate::foundation::collections::{ComponentId, EntityId};
use crate::core::ConfigurationError;

/// Current state of a component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Attached but not yet awoken
    Uninitialized,
    /// `on_awake` has run; never enabled yet
    Awoken,
    /// `on_enable` has run; `on_start` still pending
    Enabled,
    /// Started and eligible for per-frame dispatch
    Active,
    /// `on_disable` has run
    Disabled,
    /// A hook failed; excluded from all further hooks
    Faulted,
    /// Terminal
    Destroyed,
}

/// A transition the state machine does not allow
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal lifecycle transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// State before the attempted transition
    pub from: LifecycleState,
    /// Requested state
    pub to: LifecycleState,
}

impl LifecycleState {
    /// Whether the component takes part in per-frame phases
    pub fn is_dispatchable(self) -> bool {
        self == Self::Active
    }

    /// Whether the component is currently enabled (started or not)
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::Active)
    }

    /// Check a transition against the state machine
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecycleState::{Active, Awoken, Destroyed, Disabled, Enabled, Faulted, Uninitialized};
        match (self, next) {
            (Uninitialized, Awoken)
            | (Awoken | Disabled, Enabled)
            | (Enabled, Active)
            | (Enabled | Active, Disabled) => true,
            (Destroyed | Faulted, Faulted) => false,
            (_, Faulted) => true,
            (Destroyed, Destroyed) => false,
            (_, Destroyed) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: Self) -> Result<(), InvalidTransition> {
        if self.can_transition_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(InvalidTransition { from: *self, to: next })
        }
    }
}

/// Errors raised by lifecycle operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// The component is not in a state that permits the operation
    #[error("component {component:?}: {source}")]
    IllegalTransition {
        /// Component the transition was attempted on
        component: ComponentId,
        /// The rejected transition
        #[source]
        source: InvalidTransition,
    },

    /// No such component
    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),

    /// No such entity
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),

    /// Entity assembly failed
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = LifecycleState::Uninitialized;
        for next in [
            LifecycleState::Awoken,
            LifecycleState::Enabled,
            LifecycleState::Active,
            LifecycleState::Disabled,
            LifecycleState::Enabled,
            LifecycleState::Active,
            LifecycleState::Disabled,
            LifecycleState::Destroyed,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state, LifecycleState::Destroyed);
    }

    #[test]
    fn test_awake_only_once() {
        let mut state = LifecycleState::Awoken;
        assert!(state.transition(LifecycleState::Awoken).is_err());
        let mut state = LifecycleState::Disabled;
        assert!(state.transition(LifecycleState::Awoken).is_err());
    }

    #[test]
    fn test_enable_reentry_rejected() {
        let mut state = LifecycleState::Active;
        let err = state.transition(LifecycleState::Enabled).unwrap_err();
        assert_eq!(err.from, LifecycleState::Active);
        assert_eq!(state, LifecycleState::Active);
    }

    #[test]
    fn test_cannot_enable_before_awake() {
        assert!(!LifecycleState::Uninitialized.can_transition_to(LifecycleState::Enabled));
    }

    #[test]
    fn test_destroyed_is_terminal() {
        for next in [
            LifecycleState::Awoken,
            LifecycleState::Enabled,
            LifecycleState::Active,
            LifecycleState::Disabled,
            LifecycleState::Faulted,
            LifecycleState::Destroyed,
        ] {
            assert!(!LifecycleState::Destroyed.can_transition_to(next));
        }
    }

    #[test]
    fn test_faulted_only_leads_to_destroyed() {
        assert!(!LifecycleState::Faulted.can_transition_to(LifecycleState::Enabled));
        assert!(!LifecycleState::Faulted.can_transition_to(LifecycleState::Active));
        assert!(LifecycleState::Faulted.can_transition_to(LifecycleState::Destroyed));
        assert!(!LifecycleState::Faulted.is_dispatchable());
    }
}
