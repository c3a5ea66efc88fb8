//! # Frame Engine
//!
//! A real-time simulation scheduler: a fixed-step accumulator loop driving
//! components through a strict lifecycle, with deferred structural changes,
//! object pooling and a synchronous event bus.
//!
//! ## Features
//!
//! - **Fixed-Step Loop**: deterministic simulation at a configured cadence,
//!   decoupled from the host frame rate, with a catch-up cap
//! - **Component Lifecycle**: awake, enable, start, per-frame phases,
//!   disable and destroy, each hook called exactly when the state machine
//!   allows it
//! - **Deferred Changes**: spawns, destroys and enable changes made inside a
//!   phase take effect at the next phase boundary
//! - **Object Pooling**: reuse of whole entities or plain values
//! - **Event Bus**: topic-based publish/subscribe tied to component lifetime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine
//!             .scheduler_mut()
//!             .spawn(EntityBlueprint::new("ship").with_component(TransformComponent::default()))
//!             .map_err(EngineError::from)?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::new("my app");
//!     let mut engine = Engine::new(config)?.with_frame_limit(600);
//!     engine.run(&mut MyApp)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;
pub mod config;

pub mod foundation;
pub mod ecs;
pub mod events;
pub mod pool;
pub mod interfaces;
pub mod scheduler;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, Application, Engine, EngineError,
        config::Config,
        core::{ApplicationConfig, ConfigurationError, SchedulerConfig},
        ecs::{
            components::{Lifetime, MovementComponent, TransformComponent},
            Capabilities, Component, Dependency, EntityBlueprint, HookContext, HookError, HookResult,
            LifecycleState, World,
        },
        events::{Event, EventPayload},
        foundation::{
            collections::{ComponentId, EntityId},
            math::{Quat, Transform, Vec3},
            time::{FrameTime, Stopwatch, Timer},
        },
        interfaces::{
            ContactEvent, ContactKind, InputSample, InputSource, PhysicsBackend, RenderFrame, RenderSink,
        },
        pool::{ObjectPool, PoolError, Poolable},
        scheduler::{FrameReport, SchedulerCore, SchedulerError, SchedulerState},
    };
}
