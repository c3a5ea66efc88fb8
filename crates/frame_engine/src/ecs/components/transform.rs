//! Transform component
//!
//! Source of the render snapshot. Keeps the state of the previous fixed step
//! next to the current one so the renderer can interpolate with the frame's
//! alpha.

use crate::ecs::component::{Capabilities, Component};
use crate::foundation::math::{Quat, Transform, Vec3};

/// World-space placement of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    current: Transform,
    previous: Transform,
    spawn: Transform,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new(Transform::identity())
    }
}

impl TransformComponent {
    /// Create at `transform`; pooled entities return here on reset
    pub fn new(transform: Transform) -> Self {
        Self {
            current: transform,
            previous: transform,
            spawn: transform,
        }
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self::new(Transform::from_position(position))
    }

    /// Current transform
    pub fn transform(&self) -> &Transform {
        &self.current
    }

    /// Transform at the previous fixed step
    pub fn previous(&self) -> &Transform {
        &self.previous
    }

    /// Current position
    pub fn position(&self) -> Vec3 {
        self.current.position
    }

    /// Teleport without interpolation
    pub fn set_position(&mut self, position: Vec3) {
        self.current.position = position;
        self.previous.position = position;
    }

    /// Set the rotation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.current.rotation = rotation;
    }

    /// Move by `offset`
    pub fn translate(&mut self, offset: Vec3) {
        self.current.translate(offset);
    }

    /// Remember the current state as the previous fixed state. Call once at
    /// the start of each fixed step, before integrating.
    pub fn snapshot(&mut self) {
        self.previous = self.current;
    }

    /// Blend between the previous and current fixed state
    pub fn interpolated(&self, alpha: f32) -> Transform {
        self.previous.interpolate(&self.current, alpha)
    }
}

impl Component for TransformComponent {
    fn capabilities(&self) -> Capabilities {
        Capabilities::RENDER | Capabilities::POOLABLE
    }

    fn name(&self) -> &'static str {
        "Transform"
    }

    fn render_transform(&self, alpha: f32) -> Option<Transform> {
        Some(self.interpolated(alpha))
    }

    fn reset_for_pool(&mut self) {
        self.current = self.spawn;
        self.previous = self.spawn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_render_transform_interpolates() {
        let mut transform = TransformComponent::from_position(Vec3::zeros());
        transform.snapshot();
        transform.translate(Vec3::new(4.0, 0.0, 0.0));

        let blended = transform.render_transform(0.25).unwrap();
        assert_relative_eq!(blended.position.x, 1.0);
        assert_relative_eq!(transform.render_transform(1.0).unwrap().position.x, 4.0);
    }

    #[test]
    fn test_pool_reset_returns_to_spawn() {
        let mut transform = TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0));
        transform.translate(Vec3::new(10.0, 0.0, 0.0));
        transform.reset_for_pool();
        assert_eq!(transform.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.previous(), transform.transform());
    }

    #[test]
    fn test_teleport_skips_interpolation() {
        let mut transform = TransformComponent::default();
        transform.set_position(Vec3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(transform.interpolated(0.0).position.x, 5.0);
    }
}
