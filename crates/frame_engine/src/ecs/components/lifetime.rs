//! Lifetime Component
//!
//! Expires an entity after a duration: pooled entities go back to their
//! pool, everything else is destroyed.

use crate::ecs::component::{Capabilities, Component, HookError, HookResult};
use crate::ecs::context::HookContext;

/// Topic published when a lifetime runs out, with the entity as payload
pub const EXPIRED_TOPIC: &str = "lifetime.expired";

/// Lifetime component for entities that should despawn after a duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    /// How long the entity should live (in seconds, 0 = forever)
    pub duration: f32,
    elapsed: f32,
    expired: bool,
}

impl Lifetime {
    /// Create a new lifetime component
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
            expired: false,
        }
    }

    /// Check if this entity's lifetime has expired
    pub fn is_expired(&self) -> bool {
        self.duration > 0.0 && self.elapsed >= self.duration
    }

    /// Get remaining lifetime in seconds
    pub fn remaining(&self) -> f32 {
        if self.duration <= 0.0 {
            f32::INFINITY
        } else {
            (self.duration - self.elapsed).max(0.0)
        }
    }

    /// Advance by `delta` seconds
    pub fn tick(&mut self, delta: f32) {
        self.elapsed += delta;
    }
}

impl Component for Lifetime {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE | Capabilities::POOLABLE
    }

    fn name(&self) -> &'static str {
        "Lifetime"
    }

    fn on_update(&mut self, ctx: &mut HookContext<'_>, frame_delta: f32) -> HookResult {
        self.tick(frame_delta);
        if self.expired || !self.is_expired() {
            return Ok(());
        }
        self.expired = true;

        let entity = ctx.entity();
        let pooled = ctx
            .registry()
            .get(entity)
            .and_then(|record| record.pool())
            .is_some();
        if pooled {
            ctx.release_to_pool(entity)
                .map_err(|err| HookError::failed(err.to_string()))?;
        } else {
            ctx.destroy_self()
                .map_err(|err| HookError::failed(err.to_string()))?;
        }
        ctx.publish(EXPIRED_TOPIC, entity);
        Ok(())
    }

    fn reset_for_pool(&mut self) {
        self.elapsed = 0.0;
        self.expired = false;
    }
}
