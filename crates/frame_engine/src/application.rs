//! Application trait and lifecycle management

use crate::engine::{Engine, EngineError};
use crate::scheduler::FrameReport;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive a simulation with [`Engine::run`].
pub trait Application {
    /// Initialize the application
    ///
    /// Called once before the scheduler starts. Register pools and services
    /// and spawn the initial entities here.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Host-level logic before the scheduler ticks
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Called after every tick with its report
    fn frame_completed(&mut self, _engine: &mut Engine, _report: &FrameReport) -> Result<(), AppError> {
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called before the scheduler is stopped, while entities are still
    /// alive.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Game logic error
    #[error("Game logic error: {0}")]
    GameLogic(String),
}
