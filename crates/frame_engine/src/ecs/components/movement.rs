//! Movement component
//!
//! Integrates velocity into the sibling [`TransformComponent`] once per
//! fixed step.

use crate::ecs::component::{Capabilities, Component, Dependency, HookError, HookResult};
use crate::ecs::components::TransformComponent;
use crate::ecs::context::HookContext;
use crate::foundation::math::Vec3;

/// Linear motion at the fixed cadence
#[derive(Debug, Clone, PartialEq)]
pub struct MovementComponent {
    /// Linear velocity in units per second
    pub velocity: Vec3,
    /// Linear acceleration in units per second squared
    pub acceleration: Vec3,
    /// Maximum speed (0 = no limit)
    pub max_speed: f32,
    /// Velocity damping per second, `0..=1`
    pub linear_damping: f32,
    launch_velocity: Vec3,
}

impl Default for MovementComponent {
    fn default() -> Self {
        Self::with_velocity(Vec3::zeros())
    }
}

impl MovementComponent {
    /// Create with an initial velocity; pooled entities return to it on reset
    pub fn with_velocity(velocity: Vec3) -> Self {
        Self {
            velocity,
            acceleration: Vec3::zeros(),
            max_speed: 0.0,
            linear_damping: 0.0,
            launch_velocity: velocity,
        }
    }

    /// Set constant acceleration
    pub fn with_acceleration(mut self, acceleration: Vec3) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Clamp speed
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed.max(0.0);
        self
    }

    /// Set linear damping
    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Advance velocity by one step and return the position delta
    pub fn integrate(&mut self, delta_time: f32) -> Vec3 {
        self.velocity += self.acceleration * delta_time;

        if self.max_speed > 0.0 {
            let speed = self.velocity.magnitude();
            if speed > self.max_speed {
                self.velocity = self.velocity.normalize() * self.max_speed;
            }
        }

        if self.linear_damping > 0.0 {
            self.velocity *= (1.0 - self.linear_damping * delta_time).max(0.0);
        }

        self.velocity * delta_time
    }
}

impl Component for MovementComponent {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FIXED_UPDATE | Capabilities::POOLABLE
    }

    fn name(&self) -> &'static str {
        "Movement"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::of::<TransformComponent>()]
    }

    fn on_fixed_update(&mut self, ctx: &mut HookContext<'_>, fixed_delta: f32) -> HookResult {
        let offset = self.integrate(fixed_delta);
        let transform = ctx
            .sibling_mut::<TransformComponent>()
            .ok_or(HookError::MissingSibling("Transform"))?;
        transform.snapshot();
        transform.translate(offset);
        Ok(())
    }

    fn reset_for_pool(&mut self) {
        self.velocity = self.launch_velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integrate_constant_velocity() {
        let mut movement = MovementComponent::with_velocity(Vec3::new(2.0, 0.0, 0.0));
        let offset = movement.integrate(0.5);
        assert_relative_eq!(offset.x, 1.0);
    }

    #[test]
    fn test_max_speed_clamps() {
        let mut movement = MovementComponent::with_velocity(Vec3::new(10.0, 0.0, 0.0)).with_max_speed(4.0);
        movement.integrate(0.1);
        assert_relative_eq!(movement.velocity.magnitude(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_reset_restores_launch_velocity() {
        let mut movement =
            MovementComponent::with_velocity(Vec3::new(1.0, 0.0, 0.0)).with_acceleration(Vec3::new(0.0, -9.8, 0.0));
        movement.integrate(1.0);
        movement.reset_for_pool();
        assert_eq!(movement.velocity, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_depends_on_transform() {
        let deps = MovementComponent::default().dependencies();
        assert_eq!(deps[0], Dependency::of::<TransformComponent>());
    }
}
