//! Math types used by transform snapshots
//!
//! Only the small amount of math needed to hand transforms to a render
//! collaborator lives here; nalgebra does the heavy lifting.

use nalgebra::{Quaternion, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Position, rotation and scale of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World space position
    pub position: Vec3,
    /// World space rotation
    pub rotation: Quat,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Move by `offset` in world space
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Blend between two transforms.
    ///
    /// Used by render collaborators to interpolate between fixed steps with
    /// the frame's interpolation alpha.
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            position: self.position.lerp(&other.position, t),
            rotation: self.rotation.slerp(&other.rotation, t),
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translate_accumulates() {
        let mut transform = Transform::identity();
        transform.translate(Vec3::new(1.0, 0.0, 0.0));
        transform.translate(Vec3::new(0.5, 2.0, 0.0));
        assert_relative_eq!(transform.position.x, 1.5);
        assert_relative_eq!(transform.position.y, 2.0);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Transform::from_position(Vec3::zeros());
        let b = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.position.x, 5.0);
        assert_relative_eq!(mid.scale.y, 1.0);
    }
}
