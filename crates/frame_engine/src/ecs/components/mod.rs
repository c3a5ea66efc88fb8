//! Built-in components

pub mod lifetime;
pub mod movement;
pub mod transform;

pub use lifetime::Lifetime;
pub use movement::MovementComponent;
pub use transform::TransformComponent;
