//! Game components for the projectile demo

use std::cell::RefCell;
use std::rc::Rc;

use frame_engine::ecs::resumable::{Resumable, WaitSeconds};
use frame_engine::ecs::{EntityStatus, Service};
use frame_engine::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pool the turret fires from
pub const PROJECTILE_POOL: &str = "projectiles";

/// Topic published for every asteroid hit, with the points as payload
pub const SCORE_TOPIC: &str = "score";

/// Points per asteroid
pub const POINTS_PER_HIT: i64 = 10;

/// Projectile template used by the pool factory
pub fn projectile(lifetime: f32) -> EntityBlueprint {
    EntityBlueprint::new("projectile")
        .with_tag("projectile")
        .with_component(TransformComponent::default())
        .with_component(MovementComponent::default())
        .with_component(Lifetime::new(lifetime))
}

/// Slow-moving target
pub fn asteroid(position: Vec3, velocity: Vec3) -> EntityBlueprint {
    EntityBlueprint::new("asteroid")
        .with_tag("asteroid")
        .with_component(TransformComponent::from_position(position))
        .with_component(MovementComponent::with_velocity(velocity))
}

/// Running totals shared with the host
#[derive(Debug, Default)]
pub struct ScoreBoard {
    pub score: i64,
    pub hits: u32,
    pub shots: u32,
}

impl Service for ScoreBoard {
    fn shutdown(&mut self) {
        log::info!(
            "final score {} ({} hits from {} shots)",
            self.score,
            self.hits,
            self.shots
        );
    }
}

/// Fires pooled projectiles in random directions on a cooldown
pub struct Turret {
    interval: f32,
    muzzle_speed: f32,
    cooldown: WaitSeconds,
    rng: StdRng,
}

impl Turret {
    pub fn new(interval: f32, muzzle_speed: f32, seed: u64) -> Self {
        Self {
            interval,
            muzzle_speed,
            cooldown: WaitSeconds::new(interval),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn fire(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        let origin = ctx.require_sibling::<TransformComponent>()?.position();
        let shot = ctx
            .acquire_pooled(PROJECTILE_POOL)
            .map_err(|e| HookError::failed(e.to_string()))?;

        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
        if let Some(transform) = ctx.component_of_mut::<TransformComponent>(shot) {
            transform.set_position(origin);
        }
        if let Some(movement) = ctx.component_of_mut::<MovementComponent>(shot) {
            movement.velocity = direction * self.muzzle_speed;
        }
        if let Some(board) = ctx.service_mut::<ScoreBoard>() {
            board.shots += 1;
        }
        log::trace!("turret fired {:?} at {:.2} rad", shot, angle);
        Ok(())
    }
}

impl Component for Turret {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn name(&self) -> &'static str {
        "Turret"
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::of::<TransformComponent>()]
    }

    fn on_update(&mut self, ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        if self.cooldown.poll(&ctx.time()).is_pending() {
            return Ok(());
        }
        self.cooldown = WaitSeconds::new(self.interval);
        self.fire(ctx)
    }
}

fn is_tagged(ctx: &HookContext<'_>, entity: EntityId, tag: &str) -> bool {
    ctx.registry().get(entity).is_some_and(|record| record.has_tag(tag))
}

/// Resolves projectile hits reported on the trigger topic
#[derive(Default)]
pub struct HitResolver {
    inbox: Rc<RefCell<Vec<ContactEvent>>>,
}

impl HitResolver {
    fn resolve(ctx: &mut HookContext<'_>, contact: ContactEvent) -> HookResult {
        let (shot, rock) = if is_tagged(ctx, contact.a, "projectile") {
            (contact.a, contact.b)
        } else {
            (contact.b, contact.a)
        };
        let rock_alive = ctx
            .registry()
            .get(rock)
            .is_some_and(|record| record.status() == EntityStatus::Live);
        if !rock_alive || !is_tagged(ctx, rock, "asteroid") {
            return Ok(());
        }
        // The shot may already be back in its pool after an earlier hit
        if ctx.release_to_pool(shot).is_err() {
            return Ok(());
        }
        ctx.destroy(rock).map_err(|e| HookError::failed(e.to_string()))?;
        if let Some(board) = ctx.service_mut::<ScoreBoard>() {
            board.score += POINTS_PER_HIT;
            board.hits += 1;
        }
        ctx.publish(SCORE_TOPIC, POINTS_PER_HIT);
        Ok(())
    }
}

impl Component for HitResolver {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn name(&self) -> &'static str {
        "HitResolver"
    }

    fn on_enable(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        let inbox = Rc::clone(&self.inbox);
        ctx.subscribe(frame_engine::events::topics::TRIGGER_ENTER, move |event| {
            if let Some(contact) = event.payload.as_contact() {
                inbox.borrow_mut().push(*contact);
            }
        })
        .map_err(|e| HookError::failed(e.to_string()))?;
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        let contacts = std::mem::take(&mut *self.inbox.borrow_mut());
        for contact in contacts {
            Self::resolve(ctx, contact)?;
        }
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.inbox.borrow_mut().clear();
        Ok(())
    }
}
