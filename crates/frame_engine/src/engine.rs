//! Host driver
//!
//! Feeds real frame time from a [`Timer`] into the scheduler, paces frames
//! to the target rate and calls the [`Application`] hooks around each tick.
//! Headless hosts can skip the loop and call [`Engine::step`] directly.

use crate::application::{AppError, Application};
use crate::config::ConfigError;
use crate::core::{ApplicationConfig, ConfigurationError};
use crate::ecs::World;
use crate::foundation::logging;
use crate::foundation::time::Timer;
use crate::interfaces::{InputSource, PhysicsBackend, RenderSink};
use crate::scheduler::{FrameReport, SchedulerCore, SchedulerError, SchedulerState};
use thiserror::Error;

/// Main engine struct
///
/// Owns the scheduler and the frame timer.
pub struct Engine {
    scheduler: SchedulerCore,
    timer: Timer,
    config: ApplicationConfig,
    running: bool,
    frame_limit: Option<u64>,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: ApplicationConfig) -> Result<Self, EngineError> {
        logging::init_with_level(&config.log_level);
        log::info!("Initializing engine for '{}'...", config.name);
        config.validate()?;
        let scheduler = SchedulerCore::new(config.scheduler.clone())?;
        Ok(Self {
            scheduler,
            timer: Timer::new(),
            config,
            running: false,
            frame_limit: None,
        })
    }

    /// Load the configuration from a TOML or RON file and create the engine
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self, EngineError> {
        use crate::config::Config;
        let config = ApplicationConfig::load_from_file(path)?;
        Self::new(config)
    }

    /// Attach the render collaborator
    pub fn with_render_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.scheduler = self.scheduler.with_render_sink(sink);
        self
    }

    /// Attach the physics collaborator
    pub fn with_physics(mut self, physics: impl PhysicsBackend + 'static) -> Self {
        self.scheduler = self.scheduler.with_physics(physics);
        self
    }

    /// Attach the input collaborator
    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.scheduler = self.scheduler.with_input(input);
        self
    }

    /// Stop [`Engine::run`] after `frames` ticks
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Run the main loop with real frame timing until [`Engine::quit`] is
    /// called or the frame limit is reached
    pub fn run<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        self.begin(app)?;
        log::info!("Starting main loop...");

        let result = self.main_loop(app);
        self.finish(app)?;
        result
    }

    fn main_loop<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        let target = self.config.scheduler.target_frame_rate;
        self.timer.reset();
        while self.running {
            if let Some(wait) = self.timer.time_until_next_frame(target) {
                std::thread::sleep(wait);
            }
            let delta_time = self.timer.update();
            self.frame(app, delta_time)?;
        }
        Ok(())
    }

    /// Run exactly `frames` ticks of `delta_time` each, without sleeping
    pub fn run_frames<T: Application>(
        &mut self,
        app: &mut T,
        frames: u64,
        delta_time: f32,
    ) -> Result<Vec<FrameReport>, EngineError> {
        self.begin(app)?;
        let mut reports = Vec::new();
        let mut result = Ok(());
        for _ in 0..frames {
            if !self.running {
                break;
            }
            match self.frame(app, delta_time) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.finish(app)?;
        result.map(|()| reports)
    }

    fn begin<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        app.initialize(self)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;
        if self.scheduler.state() == SchedulerState::Stopped {
            self.scheduler.start()?;
        }
        self.running = true;
        Ok(())
    }

    fn frame<T: Application>(&mut self, app: &mut T, delta_time: f32) -> Result<FrameReport, EngineError> {
        app.update(self, delta_time)
            .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;
        let report = self.step(delta_time)?;
        app.frame_completed(self, &report)
            .map_err(|e| EngineError::ApplicationError(format!("App frame: {e}")))?;
        if self.frame_limit.is_some_and(|limit| report.frame >= limit) {
            self.running = false;
        }
        Ok(report)
    }

    fn finish<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        self.running = false;
        app.cleanup(self);
        if self.scheduler.state() != SchedulerState::Halted {
            self.scheduler.stop()?;
        }
        log::info!("Engine shutdown complete");
        Ok(())
    }

    /// Tick the scheduler once with an explicit delta
    pub fn step(&mut self, delta_time: f32) -> Result<FrameReport, EngineError> {
        Ok(self.scheduler.tick(delta_time)?)
    }

    /// Pause simulation
    pub fn pause(&mut self) -> Result<(), EngineError> {
        Ok(self.scheduler.pause()?)
    }

    /// Resume simulation without feeding the paused wall time into the
    /// accumulator
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.scheduler.resume()?;
        self.timer.reset();
        Ok(())
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get the scheduler
    pub fn scheduler(&self) -> &SchedulerCore {
        &self.scheduler
    }

    /// Get mutable access to the scheduler
    pub fn scheduler_mut(&mut self) -> &mut SchedulerCore {
        &mut self.scheduler
    }

    /// Get the world
    pub fn world(&self) -> &World {
        self.scheduler.world()
    }

    /// Get mutable access to the world
    pub fn world_mut(&mut self) -> &mut World {
        self.scheduler.world_mut()
    }

    /// Configuration the engine was created with
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Real time measured for the last frame
    pub fn delta_time(&self) -> f32 {
        self.timer.delta_time()
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Configuration file could not be read
    #[error("Config file error: {0}")]
    ConfigFile(#[from] ConfigError),

    /// Scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

impl From<AppError> for EngineError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Engine(inner) => inner,
            other => Self::ApplicationError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchedulerConfig;
    use crate::ecs::components::{Lifetime, TransformComponent};
    use crate::ecs::EntityBlueprint;

    #[derive(Default)]
    struct Probe {
        initialized: bool,
        updates: u32,
        completed: Vec<u64>,
        cleaned_up: bool,
    }

    impl Application for Probe {
        fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
            self.initialized = true;
            engine
                .scheduler_mut()
                .spawn(
                    EntityBlueprint::new("ship")
                        .with_component(TransformComponent::default())
                        .with_component(Lifetime::new(0.0)),
                )
                .map_err(EngineError::from)?;
            Ok(())
        }

        fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
            self.updates += 1;
            Ok(())
        }

        fn frame_completed(&mut self, _engine: &mut Engine, report: &FrameReport) -> Result<(), AppError> {
            self.completed.push(report.frame);
            Ok(())
        }

        fn cleanup(&mut self, engine: &mut Engine) {
            self.cleaned_up = engine.world().registry().len() == 1;
        }
    }

    fn engine() -> Engine {
        let config = ApplicationConfig::new("test")
            .with_log_level("warn")
            .with_scheduler(SchedulerConfig::new().with_fixed_delta_time(0.02));
        Engine::new(config).unwrap()
    }

    #[test]
    fn test_run_frames_drives_application() {
        let mut engine = engine();
        let mut app = Probe::default();
        let reports = engine.run_frames(&mut app, 3, 0.02).unwrap();

        assert!(app.initialized);
        assert_eq!(app.updates, 3);
        assert_eq!(app.completed, vec![1, 2, 3]);
        assert!(app.cleaned_up);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports.iter().map(|r| r.fixed_steps).sum::<u32>(), 3);
        assert_eq!(engine.scheduler().state(), SchedulerState::Stopped);
        assert!(engine.world().registry().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ApplicationConfig::new("bad")
            .with_scheduler(SchedulerConfig::new().with_fixed_delta_time(-1.0));
        assert!(matches!(
            Engine::new(config),
            Err(EngineError::Configuration(ConfigurationError::InvalidFixedDelta(_)))
        ));
    }

    #[test]
    fn test_frame_limit_ends_run() {
        let mut engine = engine().with_frame_limit(2);
        let mut app = Probe::default();
        engine.run(&mut app).unwrap();
        assert_eq!(app.completed, vec![1, 2]);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_invalid_delta_halts() {
        let mut engine = engine();
        engine.scheduler_mut().start().unwrap();
        assert!(engine.step(f32::NAN).is_err());
        assert_eq!(engine.scheduler().state(), SchedulerState::Halted);
        assert!(matches!(
            engine.step(0.02),
            Err(EngineError::Scheduler(SchedulerError::Halted))
        ));
    }
}
