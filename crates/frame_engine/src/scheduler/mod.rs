//! Frame scheduler
//!
//! One call to [`SchedulerCore::tick`] is one host frame:
//!
//! 1. accumulate the real delta
//! 2. zero or more fixed steps (capped), each followed by a physics step
//! 3. exactly one update phase
//! 4. exactly one late update phase
//! 5. render signal with the transform snapshot
//! 6. end-of-frame drain
//!
//! Queued structural changes are applied before every phase.

pub mod accumulator;

pub use accumulator::FixedStepAccumulator;

use std::time::Duration;

use crate::core::{ConfigurationError, SchedulerConfig};
use crate::ecs::component::Capabilities;
use crate::ecs::dispatcher::{FaultRecord, LifecycleDispatcher};
use crate::ecs::entity::EntityBlueprint;
use crate::ecs::lifecycle::LifecycleError;
use crate::ecs::services::Service;
use crate::ecs::world::World;
use crate::foundation::collections::EntityId;
use crate::foundation::time::Stopwatch;
use crate::interfaces::{InputSource, PhysicsBackend, RenderEntry, RenderFrame, RenderSink};
use crate::pool::EntityPoolId;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Not ticking; the world may be populated
    Stopped,
    /// Ticking normally
    Running,
    /// Ticking without simulation
    Paused,
    /// A scheduler-level fault tore everything down; terminal
    Halted,
}

/// Scheduler-level errors. Delta and invariant violations halt the scheduler.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// The host passed a negative or non-finite delta
    #[error("invalid frame delta {0}")]
    InvalidDelta(f32),

    /// The accumulator left `[0, fixed_delta)` after the fixed phase
    #[error("accumulator {accumulator} outside [0, {fixed_delta})")]
    AccumulatorInvariant {
        /// Accumulator value found
        accumulator: f64,
        /// Configured fixed delta
        fixed_delta: f32,
    },

    /// The scheduler halted earlier and cannot be used
    #[error("scheduler is halted")]
    Halted,

    /// The operation is not valid in the current state
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        /// Attempted operation
        action: &'static str,
        /// State at the time
        state: SchedulerState,
    },

    /// Invalid configuration or entity assembly failure
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Lifecycle misuse
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Frame index, starting at 1
    pub frame: u64,
    /// Fixed steps run this frame
    pub fixed_steps: u32,
    /// Seconds dropped because the step cap was hit
    pub discarded: f64,
    /// Accumulator left over after the fixed steps
    pub accumulator: f64,
    /// Interpolation factor handed to the renderer
    pub alpha: f32,
    /// Whether the frame ran paused
    pub paused: bool,
    /// Components faulted this frame
    pub faults: usize,
    /// Entities spawned from hooks that failed assembly
    pub configuration_errors: usize,
    /// Entities removed at the drain
    pub entities_removed: usize,
    /// Entities in the render snapshot
    pub rendered: usize,
    /// Time spent in fixed steps
    pub fixed_time: Duration,
    /// Time spent in update
    pub update_time: Duration,
    /// Time spent in late update
    pub late_update_time: Duration,
    /// Time spent in the whole tick
    pub total_time: Duration,
}

/// Cumulative scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SchedulerStats {
    /// Ticks processed
    pub frames: u64,
    /// Fixed steps run
    pub fixed_steps: u64,
    /// Frames that hit the step cap
    pub capped_frames: u64,
    /// Seconds of simulation dropped by the cap
    pub discarded_time: f64,
    /// Contacts republished from physics
    pub contacts: u64,
}

/// Fixed-step frame scheduler owning the world
pub struct SchedulerCore {
    config: SchedulerConfig,
    state: SchedulerState,
    accumulator: FixedStepAccumulator,
    world: World,
    dispatcher: LifecycleDispatcher,
    render: Option<Box<dyn RenderSink>>,
    physics: Option<Box<dyn PhysicsBackend>>,
    input: Option<Box<dyn InputSource>>,
    frame: u64,
    stats: SchedulerStats,
    last_render: RenderFrame,
}

impl SchedulerCore {
    /// Create a stopped scheduler
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let accumulator =
            FixedStepAccumulator::new(config.fixed_delta_time, config.max_fixed_steps_per_frame)?;
        let mut world = World::new();
        world.time.fixed_delta = config.fixed_delta_time;
        Ok(Self {
            config,
            state: SchedulerState::Stopped,
            accumulator,
            world,
            dispatcher: LifecycleDispatcher::new(),
            render: None,
            physics: None,
            input: None,
            frame: 0,
            stats: SchedulerStats::default(),
            last_render: RenderFrame::default(),
        })
    }

    /// Attach the render collaborator
    pub fn with_render_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.render = Some(Box::new(sink));
        self
    }

    /// Attach the physics collaborator
    pub fn with_physics(mut self, physics: impl PhysicsBackend + 'static) -> Self {
        self.physics = Some(Box::new(physics));
        self
    }

    /// Attach the input collaborator
    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Shared simulation state
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable shared simulation state
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Lifecycle dispatcher
    pub fn dispatcher(&self) -> &LifecycleDispatcher {
        &self.dispatcher
    }

    /// Faults recorded so far
    pub fn faults(&self) -> &[FaultRecord] {
        self.dispatcher.faults()
    }

    /// Cumulative counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Current accumulator
    pub fn accumulator(&self) -> &FixedStepAccumulator {
        &self.accumulator
    }

    /// Snapshot most recently handed to the renderer
    pub fn last_render(&self) -> &RenderFrame {
        &self.last_render
    }

    /// Frames ticked since the last start
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Create and assemble an entity from host code.
    ///
    /// Assembly runs immediately, so a missing dependency or failing awake
    /// hook is returned here. `on_start` runs before the next phase.
    pub fn spawn(&mut self, blueprint: EntityBlueprint) -> Result<EntityId, SchedulerError> {
        self.ensure_usable("spawn")?;
        let entity = self.world.registry.create(blueprint);
        self.dispatcher.assemble(&mut self.world, entity)?;
        Ok(entity)
    }

    /// Register a named entity pool, pre-warmed to the configured capacity.
    ///
    /// The pre-warmed members are assembled at the next phase boundary, in
    /// spawn order with everything else created this frame.
    pub fn register_pool(
        &mut self,
        name: &str,
        factory: impl FnMut() -> EntityBlueprint + 'static,
    ) -> Result<EntityPoolId, SchedulerError> {
        self.ensure_usable("register a pool")?;
        let capacity = self.config.pool_capacity(name);
        Ok(self.world.register_pool(name, capacity, factory)?)
    }

    /// Register a service reachable from every hook
    pub fn insert_service<S: Service>(&mut self, service: S) -> Option<S> {
        self.world.insert_service(service)
    }

    fn ensure_usable(&self, action: &'static str) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Halted => Err(SchedulerError::Halted),
            _ => {
                log::trace!("{} while {:?}", action, self.state);
                Ok(())
            }
        }
    }

    /// Begin ticking
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Stopped => {
                self.state = SchedulerState::Running;
                log::info!(
                    "scheduler started (fixed delta {} s, cap {} steps)",
                    self.config.fixed_delta_time,
                    self.config.max_fixed_steps_per_frame
                );
                Ok(())
            }
            SchedulerState::Halted => Err(SchedulerError::Halted),
            state => Err(SchedulerError::InvalidState { action: "start", state }),
        }
    }

    /// Freeze simulation; entities stay alive
    pub fn pause(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Running => {
                self.state = SchedulerState::Paused;
                log::info!("scheduler paused at frame {}", self.frame);
                Ok(())
            }
            SchedulerState::Paused => Ok(()),
            SchedulerState::Halted => Err(SchedulerError::Halted),
            state => Err(SchedulerError::InvalidState { action: "pause", state }),
        }
    }

    /// Continue after a pause
    pub fn resume(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Paused => {
                self.state = SchedulerState::Running;
                log::info!("scheduler resumed at frame {}", self.frame);
                Ok(())
            }
            SchedulerState::Running => Ok(()),
            SchedulerState::Halted => Err(SchedulerError::Halted),
            state => Err(SchedulerError::InvalidState { action: "resume", state }),
        }
    }

    /// Tear down every entity, subscription, pool and service
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Halted => Err(SchedulerError::Halted),
            SchedulerState::Stopped => Ok(()),
            SchedulerState::Running | SchedulerState::Paused => {
                self.teardown();
                self.state = SchedulerState::Stopped;
                log::info!("scheduler stopped");
                Ok(())
            }
        }
    }

    fn teardown(&mut self) {
        let report = self.dispatcher.teardown(&mut self.world);
        log::debug!(
            "teardown removed {} entities, {} components",
            report.entities_removed,
            report.components_removed
        );
        self.world.clear();
        self.world.time.fixed_delta = self.config.fixed_delta_time;
        self.accumulator.reset();
        self.frame = 0;
        self.last_render = RenderFrame::default();
    }

    fn halt(&mut self, error: SchedulerError) -> SchedulerError {
        log::error!("scheduler halted at frame {}: {}", self.frame, error);
        self.teardown();
        self.state = SchedulerState::Halted;
        error
    }

    /// Advance one host frame by `real_delta` seconds
    pub fn tick(&mut self, real_delta: f32) -> Result<FrameReport, SchedulerError> {
        match self.state {
            SchedulerState::Halted => return Err(SchedulerError::Halted),
            SchedulerState::Stopped => {
                return Err(SchedulerError::InvalidState {
                    action: "tick",
                    state: SchedulerState::Stopped,
                })
            }
            SchedulerState::Running | SchedulerState::Paused => {}
        }
        if !real_delta.is_finite() || real_delta < 0.0 {
            return Err(self.halt(SchedulerError::InvalidDelta(real_delta)));
        }

        let total = Stopwatch::start_new();
        self.frame += 1;
        self.world.time.frame = self.frame;
        self.world.time.delta = real_delta;
        let faults_before = self.dispatcher.faults().len();

        let mut report = if self.state == SchedulerState::Paused {
            self.paused_frame()
        } else {
            self.running_frame(real_delta)?
        };

        report.configuration_errors = self.dispatcher.take_configuration_errors().len();
        report.entities_removed = self.dispatcher.drain(&mut self.world).entities_removed;
        report.faults = self.dispatcher.faults().len() - faults_before;
        report.frame = self.frame;
        report.total_time = total.elapsed();
        self.stats.frames += 1;
        Ok(report)
    }

    fn paused_frame(&mut self) -> FrameReport {
        self.dispatcher.settle(&mut self.world);
        let mut frame = self.last_render.clone();
        frame.frame = self.frame;
        frame.paused = true;
        self.signal_render(frame);
        FrameReport {
            paused: true,
            accumulator: self.accumulator.value(),
            alpha: self.last_render.alpha,
            rendered: self.last_render.entries.len(),
            ..FrameReport::default()
        }
    }

    fn running_frame(&mut self, real_delta: f32) -> Result<FrameReport, SchedulerError> {
        let mut report = FrameReport::default();

        if let Some(input) = self.input.as_mut() {
            self.world.input = input.sample();
        }

        let fixed_delta = self.accumulator.fixed_delta();
        let mut phase_timer = Stopwatch::start_new();
        self.accumulator.accumulate(real_delta);
        let mut steps = 0;
        while self.accumulator.step_due(steps) {
            self.dispatcher.settle(&mut self.world);
            self.world.time.elapsed = self.accumulator.elapsed();
            self.world.events.update_time(self.accumulator.elapsed());
            self.dispatcher.run_fixed_update(&mut self.world, fixed_delta);
            self.step_physics(fixed_delta);
            self.accumulator.consume_step();
            steps += 1;
        }
        report.fixed_time = phase_timer.lap();

        let discarded = self.accumulator.finish_frame(steps);
        if discarded > 0.0 {
            self.stats.capped_frames += 1;
            self.stats.discarded_time += discarded;
            log::warn!(
                "frame {}: step cap {} hit, discarding {:.4} s of simulation",
                self.frame,
                self.accumulator.max_steps(),
                discarded
            );
        }
        if !self.accumulator.invariant_holds() {
            let error = SchedulerError::AccumulatorInvariant {
                accumulator: self.accumulator.value(),
                fixed_delta,
            };
            return Err(self.halt(error));
        }

        let alpha = self.accumulator.alpha();
        self.world.time.elapsed = self.accumulator.elapsed();
        self.world.time.alpha = alpha;
        self.world.events.update_time(self.accumulator.elapsed());

        self.dispatcher.settle(&mut self.world);
        self.dispatcher.run_update(&mut self.world, real_delta);
        report.update_time = phase_timer.lap();

        self.dispatcher.settle(&mut self.world);
        self.dispatcher.run_late_update(&mut self.world, real_delta);
        self.dispatcher.settle(&mut self.world);
        report.late_update_time = phase_timer.lap();

        let frame = self.render_snapshot(alpha);
        report.rendered = frame.entries.len();
        self.signal_render(frame);

        self.stats.fixed_steps += u64::from(steps);
        report.fixed_steps = steps;
        report.discarded = discarded;
        report.accumulator = self.accumulator.value();
        report.alpha = alpha;
        Ok(report)
    }

    fn step_physics(&mut self, fixed_delta: f32) {
        let Some(physics) = self.physics.as_mut() else {
            return;
        };
        let contacts = physics.step(fixed_delta, &self.world.registry);
        for contact in contacts {
            self.world.events.publish(contact.kind.topic(), contact);
            self.stats.contacts += 1;
        }
    }

    fn render_snapshot(&self, alpha: f32) -> RenderFrame {
        let registry = &self.world.registry;
        let entries = registry
            .iter()
            .filter(|(_, record)| record.is_active())
            .filter_map(|(entity, record)| {
                record.components().iter().find_map(|&component| {
                    let slot = registry.slot(component)?;
                    if !slot.capabilities.contains(Capabilities::RENDER) || !slot.state.is_dispatchable() {
                        return None;
                    }
                    slot.behaviour.as_deref()?.render_transform(alpha)
                })
                .map(|transform| RenderEntry { entity, transform })
            })
            .collect();
        RenderFrame {
            frame: self.frame,
            alpha,
            paused: false,
            entries,
        }
    }

    fn signal_render(&mut self, frame: RenderFrame) {
        if let Some(render) = self.render.as_mut() {
            render.submit(&frame);
        }
        self.last_render = frame;
    }
}

impl Drop for SchedulerCore {
    fn drop(&mut self) {
        if matches!(self.state, SchedulerState::Running | SchedulerState::Paused) {
            self.teardown();
        }
    }
}
