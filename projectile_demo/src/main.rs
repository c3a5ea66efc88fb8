//! Projectile demo
//!
//! A turret fires pooled projectiles at drifting asteroids. Hits arrive as
//! trigger contacts from the overlap physics, are resolved in update and
//! scored through the event bus. Rendering is a console sink that only
//! counts what it would draw.
//!
//! Usage: `projectile_demo [config.toml|config.ron]`

mod components;
mod physics;

use std::cell::Cell;
use std::rc::Rc;

use frame_engine::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use components::{asteroid, projectile, HitResolver, ScoreBoard, Turret, PROJECTILE_POOL, SCORE_TOPIC};
use physics::OverlapPhysics;

/// Seconds a projectile flies before returning to its pool
const PROJECTILE_LIFETIME: f32 = 1.5;

/// Run for at most this many frames
const FRAME_LIMIT: u64 = 60 * 30;

/// Counts what a real renderer would draw
#[derive(Default)]
struct ConsoleRenderer {
    frames: u64,
    peak_entries: usize,
}

impl RenderSink for ConsoleRenderer {
    fn submit(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        self.peak_entries = self.peak_entries.max(frame.entries.len());
        if frame.paused {
            log::trace!("frame {} paused", frame.frame);
        } else {
            log::trace!(
                "frame {}: {} entries, alpha {:.2}",
                frame.frame,
                frame.entries.len(),
                frame.alpha
            );
        }
    }
}

impl Drop for ConsoleRenderer {
    fn drop(&mut self) {
        log::info!(
            "renderer received {} frames, at most {} entries",
            self.frames,
            self.peak_entries
        );
    }
}

struct DemoApp {
    asteroids: usize,
    rng: StdRng,
    score: Rc<Cell<i64>>,
}

impl DemoApp {
    fn new(asteroids: usize, seed: u64) -> Self {
        Self {
            asteroids,
            rng: StdRng::seed_from_u64(seed),
            score: Rc::new(Cell::new(0)),
        }
    }

    fn spawn_field(&mut self, scheduler: &mut SchedulerCore) -> Result<(), SchedulerError> {
        for _ in 0..self.asteroids {
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = self.rng.gen_range(4.0..10.0);
            let position = Vec3::new(angle.cos() * distance, angle.sin() * distance, 0.0);
            let drift = Vec3::new(self.rng.gen_range(-0.5..0.5), self.rng.gen_range(-0.5..0.5), 0.0);
            scheduler.spawn(asteroid(position, drift))?;
        }
        Ok(())
    }
}

impl Application for DemoApp {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let scheduler = engine.scheduler_mut();
        scheduler.insert_service(ScoreBoard::default());
        scheduler
            .register_pool(PROJECTILE_POOL, || projectile(PROJECTILE_LIFETIME))
            .map_err(EngineError::from)?;

        scheduler
            .spawn(
                EntityBlueprint::new("turret")
                    .with_component(TransformComponent::default())
                    .with_component(Turret::new(0.2, 10.0, self.rng.gen())),
            )
            .map_err(EngineError::from)?;
        scheduler
            .spawn(EntityBlueprint::new("referee").with_component(HitResolver::default()))
            .map_err(EngineError::from)?;
        self.spawn_field(scheduler).map_err(EngineError::from)?;

        let score = Rc::clone(&self.score);
        scheduler
            .world_mut()
            .events_mut()
            .subscribe(SCORE_TOPIC, None::<ComponentId>, move |event: &Event| {
                let points = event.payload.as_int().unwrap_or(0);
                score.set(score.get() + points);
                log::info!("hit! +{} (total {})", points, score.get());
            })
            .map_err(|e| AppError::GameLogic(e.to_string()))?;

        log::info!("spawned {} asteroids", self.asteroids);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        if engine.world().registry().find_by_tag("asteroid").is_empty() {
            log::info!("field cleared");
            engine.quit();
        }
        Ok(())
    }

    fn frame_completed(&mut self, engine: &mut Engine, report: &FrameReport) -> Result<(), AppError> {
        if report.faults > 0 {
            return Err(AppError::GameLogic(format!(
                "{} component faults in frame {}",
                report.faults, report.frame
            )));
        }
        if report.frame % 60 == 0 {
            let world = engine.world();
            let available = world
                .pools()
                .id(PROJECTILE_POOL)
                .map_or(0, |pool| world.pools().available(pool));
            log::info!(
                "frame {}: {} entities, {} projectiles pooled, {} fixed steps, score {}",
                report.frame,
                world.registry().len(),
                available,
                report.fixed_steps,
                self.score.get()
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        let hits = engine
            .world()
            .services()
            .get::<ScoreBoard>()
            .map_or(0, |board| board.hits);
        log::info!(
            "cleaning up after {} frames, {} hits",
            engine.scheduler().frame(),
            hits
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ApplicationConfig::load_from_file(path)?,
        None => ApplicationConfig::new("Projectile Demo")
            .with_scheduler(SchedulerConfig::new().with_pool_capacity(PROJECTILE_POOL, 16)),
    };

    let mut engine = Engine::new(config)?
        .with_physics(OverlapPhysics::new(0.8))
        .with_render_sink(ConsoleRenderer::default())
        .with_frame_limit(FRAME_LIMIT);
    let mut app = DemoApp::new(12, 7);
    engine.run(&mut app)?;
    Ok(())
}
