//! Lifecycle dispatcher
//!
//! Drives every component through its state machine and invokes hooks in
//! registry order. Structural changes queued by hooks are applied by
//! [`LifecycleDispatcher::settle`] at phase boundaries and by
//! [`LifecycleDispatcher::drain`] once per frame.
//!
//! A hook is called with its own component taken out of storage, so the
//! hook can borrow the whole world mutably through its [`HookContext`].

use crate::core::ConfigurationError;
use crate::ecs::component::{Capabilities, Component, HookError, HookResult};
use crate::ecs::context::HookContext;
use crate::ecs::entity::EntityStatus;
use crate::ecs::lifecycle::{InvalidTransition, LifecycleError, LifecycleState};
use crate::ecs::registry::{DrainReport, PendingOp};
use crate::ecs::world::World;
use crate::foundation::collections::{ComponentId, EntityId};

/// Settle passes allowed per phase boundary before remaining work is
/// carried to the next boundary
pub const DEFAULT_MAX_SETTLE_PASSES: usize = 16;

/// Per-frame phases that dispatch to components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fixed-cadence simulation step
    FixedUpdate,
    /// Once-per-frame logic
    Update,
    /// Once-per-frame logic after every update
    LateUpdate,
}

impl Phase {
    /// Capability a component needs to take part in the phase
    pub fn capability(self) -> Capabilities {
        match self {
            Self::FixedUpdate => Capabilities::FIXED_UPDATE,
            Self::Update => Capabilities::UPDATE,
            Self::LateUpdate => Capabilities::LATE_UPDATE,
        }
    }

    fn hook(self) -> HookKind {
        match self {
            Self::FixedUpdate => HookKind::FixedUpdate,
            Self::Update => HookKind::Update,
            Self::LateUpdate => HookKind::LateUpdate,
        }
    }
}

/// Component hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// `on_awake`
    Awake,
    /// `on_enable`
    Enable,
    /// `on_start`
    Start,
    /// `on_fixed_update`
    FixedUpdate,
    /// `on_update`
    Update,
    /// `on_late_update`
    LateUpdate,
    /// `on_disable`
    Disable,
    /// `on_destroy`
    Destroy,
}

/// A hook failure that isolated its component
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    /// Owning entity
    pub entity: EntityId,
    /// Faulted component
    pub component: ComponentId,
    /// Diagnostic component name
    pub component_name: &'static str,
    /// Hook that failed
    pub hook: HookKind,
    /// Frame the failure happened in
    pub frame: u64,
    /// Error returned by the hook
    pub error: HookError,
}

/// Outcome of one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Hooks invoked
    pub invoked: usize,
    /// Components faulted during the phase
    pub faults: usize,
}

/// Cumulative dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Hooks invoked of any kind
    pub hooks_invoked: u64,
    /// Components moved to `Faulted`
    pub faults: u64,
    /// Components that completed `on_start`
    pub started: u64,
    /// Entities assembled
    pub assembled: u64,
    /// Entities rejected during assembly
    pub assembly_failures: u64,
    /// Phase boundaries that hit the settle pass limit
    pub settle_overflows: u64,
    /// Deferred enable or disable requests that no longer applied
    pub rejected_ops: u64,
}

/// Lifecycle state machine driver
pub struct LifecycleDispatcher {
    faults: Vec<FaultRecord>,
    configuration_errors: Vec<ConfigurationError>,
    stats: DispatchStats,
    max_settle_passes: usize,
}

impl Default for LifecycleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleDispatcher {
    /// Create a dispatcher
    pub fn new() -> Self {
        Self {
            faults: Vec::new(),
            configuration_errors: Vec::new(),
            stats: DispatchStats::default(),
            max_settle_passes: DEFAULT_MAX_SETTLE_PASSES,
        }
    }

    /// Limit the settle passes per phase boundary
    pub fn with_max_settle_passes(mut self, passes: usize) -> Self {
        self.max_settle_passes = passes.max(1);
        self
    }

    /// Cumulative counters
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Every fault recorded so far
    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    /// Take assembly errors recorded for entities spawned from hooks
    pub fn take_configuration_errors(&mut self) -> Vec<ConfigurationError> {
        std::mem::take(&mut self.configuration_errors)
    }

    fn call(&mut self, world: &mut World, component: ComponentId, hook: HookKind, delta: f32) -> Option<HookResult> {
        let (entity, mut behaviour) = world.registry.take_behaviour(component)?;
        let result = {
            let mut ctx = HookContext::new(world, entity, component);
            invoke(behaviour.as_mut(), &mut ctx, hook, delta)
        };
        world.registry.restore_behaviour(component, behaviour);
        self.stats.hooks_invoked += 1;
        log::trace!("{:?} -> {:?} on {:?}", hook, result.is_ok(), component);
        Some(result)
    }

    /// Isolate a component whose hook failed
    pub fn fault(&mut self, world: &mut World, component: ComponentId, hook: HookKind, error: HookError) {
        let Some(slot) = world.registry.slot_mut(component) else {
            return;
        };
        if slot.state.transition(LifecycleState::Faulted).is_err() {
            return;
        }
        let entity = slot.entity;
        let component_name = slot.name;
        world.events.invalidate_owner(component);
        let entity_name = world
            .registry
            .get(entity)
            .map_or("<unknown>", |record| record.name());
        log::error!(
            "component `{}` {:?} on entity '{}' {:?} faulted in {:?}: {}",
            component_name,
            component,
            entity_name,
            entity,
            hook,
            error
        );
        self.faults.push(FaultRecord {
            entity,
            component,
            component_name,
            hook,
            frame: world.time.frame,
            error,
        });
        self.stats.faults += 1;
    }

    /// Run `on_awake` on a freshly attached component
    pub fn awaken(&mut self, world: &mut World, component: ComponentId) -> Result<(), LifecycleError> {
        let slot = world
            .registry
            .slot(component)
            .ok_or(LifecycleError::UnknownComponent(component))?;
        let (entity, name) = (slot.entity, slot.name);
        if !slot.state.can_transition_to(LifecycleState::Awoken) {
            return Err(LifecycleError::IllegalTransition {
                component,
                source: InvalidTransition {
                    from: slot.state,
                    to: LifecycleState::Awoken,
                },
            });
        }
        match self.call(world, component, HookKind::Awake, 0.0) {
            Some(Ok(())) | None => {
                if let Some(slot) = world.registry.slot_mut(component) {
                    slot.state = LifecycleState::Awoken;
                }
                Ok(())
            }
            Some(Err(error)) => {
                if let Some(slot) = world.registry.slot_mut(component) {
                    slot.state = LifecycleState::Faulted;
                }
                world.events.invalidate_owner(component);
                Err(ConfigurationError::AwakeFailed {
                    entity,
                    component: name,
                    reason: error.to_string(),
                }
                .into())
            }
        }
    }

    /// Enable a component.
    ///
    /// Enabling an enabled or active component is illegal re-entry. On an
    /// inactive entity the request is remembered and applied when the entity
    /// activates. A component that already started returns straight to
    /// `Active` without repeating `on_start`.
    pub fn enable(&mut self, world: &mut World, component: ComponentId) -> Result<(), LifecycleError> {
        let slot = world
            .registry
            .slot_mut(component)
            .ok_or(LifecycleError::UnknownComponent(component))?;
        if slot.state == LifecycleState::Uninitialized {
            slot.wants_enabled = true;
            return Ok(());
        }
        if !slot.state.can_transition_to(LifecycleState::Enabled) {
            return Err(LifecycleError::IllegalTransition {
                component,
                source: InvalidTransition {
                    from: slot.state,
                    to: LifecycleState::Enabled,
                },
            });
        }
        slot.wants_enabled = true;
        let entity = slot.entity;
        let doomed = slot.doomed;
        let entity_ready = world
            .registry
            .get(entity)
            .is_some_and(|record| record.is_active() && record.status() == EntityStatus::Live);
        if doomed || !entity_ready {
            return Ok(());
        }
        self.enable_now(world, component);
        Ok(())
    }

    fn enable_now(&mut self, world: &mut World, component: ComponentId) {
        let Some(slot) = world.registry.slot_mut(component) else {
            return;
        };
        if slot.state.transition(LifecycleState::Enabled).is_err() {
            return;
        }
        // Subscriptions open with the enabled window, before the enable hook
        world.events.activate_owner(component);
        match self.call(world, component, HookKind::Enable, 0.0) {
            Some(Err(error)) => self.fault(world, component, HookKind::Enable, error),
            _ => {
                let Some(slot) = world.registry.slot_mut(component) else {
                    return;
                };
                if slot.state != LifecycleState::Enabled {
                    return;
                }
                if slot.started {
                    slot.state = LifecycleState::Active;
                } else {
                    world.registry.queue_start(component);
                }
            }
        }
    }

    /// Disable a component. Disabling a component that is not enabled is a
    /// no-op.
    pub fn disable(&mut self, world: &mut World, component: ComponentId) -> Result<(), LifecycleError> {
        let slot = world
            .registry
            .slot_mut(component)
            .ok_or(LifecycleError::UnknownComponent(component))?;
        slot.wants_enabled = false;
        self.disable_now(world, component);
        Ok(())
    }

    /// Disable without touching the enable intent, used when an entity is
    /// deactivated or destroyed
    fn disable_now(&mut self, world: &mut World, component: ComponentId) {
        let Some(slot) = world.registry.slot_mut(component) else {
            return;
        };
        if !slot.state.is_enabled() {
            return;
        }
        // Subscriptions die before the disable hook runs
        world.events.invalidate_owner(component);
        if let Some(slot) = world.registry.slot_mut(component) {
            slot.state = LifecycleState::Disabled;
        }
        if let Some(Err(error)) = self.call(world, component, HookKind::Disable, 0.0) {
            self.fault(world, component, HookKind::Disable, error);
        }
    }

    /// Run the destroy sequence on one component. Only valid during drain.
    pub fn destroy_immediate(&mut self, world: &mut World, component: ComponentId) {
        let Some(slot) = world.registry.slot(component) else {
            return;
        };
        let state = slot.state;
        if state == LifecycleState::Destroyed {
            return;
        }
        if state.is_enabled() {
            self.disable_now(world, component);
        }
        let state = world
            .registry
            .slot(component)
            .map_or(LifecycleState::Destroyed, |slot| slot.state);
        if !matches!(state, LifecycleState::Uninitialized | LifecycleState::Faulted | LifecycleState::Destroyed) {
            if let Some(Err(error)) = self.call(world, component, HookKind::Destroy, 0.0) {
                // Already on its way out; the fault is recorded and the
                // component is still removed.
                self.fault(world, component, HookKind::Destroy, error);
            }
        }
        world.events.remove_owner(component);
        if let Some(slot) = world.registry.slot_mut(component) {
            slot.state = LifecycleState::Destroyed;
        }
    }

    /// Run fixed update on every active `FIXED_UPDATE` component
    pub fn run_fixed_update(&mut self, world: &mut World, fixed_delta: f32) -> PhaseReport {
        self.run_phase(world, Phase::FixedUpdate, fixed_delta)
    }

    /// Run update on every active `UPDATE` component
    pub fn run_update(&mut self, world: &mut World, frame_delta: f32) -> PhaseReport {
        self.run_phase(world, Phase::Update, frame_delta)
    }

    /// Run late update on every active `LATE_UPDATE` component
    pub fn run_late_update(&mut self, world: &mut World, frame_delta: f32) -> PhaseReport {
        self.run_phase(world, Phase::LateUpdate, frame_delta)
    }

    /// Invoke the phase hook on a snapshot of the active components.
    ///
    /// Entities destroyed during the phase keep their place in the snapshot
    /// and disappear from the next phase.
    pub fn run_phase(&mut self, world: &mut World, phase: Phase, delta: f32) -> PhaseReport {
        let mut report = PhaseReport::default();
        let snapshot = world.registry.for_each_active(phase.capability());
        for component in &snapshot {
            let dispatchable = world
                .registry
                .slot(component)
                .is_some_and(|slot| slot.state.is_dispatchable());
            if !dispatchable {
                continue;
            }
            match self.call(world, component, phase.hook(), delta) {
                Some(Ok(())) => report.invoked += 1,
                Some(Err(error)) => {
                    report.invoked += 1;
                    report.faults += 1;
                    self.fault(world, component, phase.hook(), error);
                }
                None => {}
            }
        }
        report
    }

    /// Apply queued structural changes and start newly enabled components.
    ///
    /// Called at every phase boundary. Work queued by the hooks this runs is
    /// applied in further passes, up to the pass limit.
    pub fn settle(&mut self, world: &mut World) -> usize {
        let mut passes = 0;
        loop {
            let ops = world.registry.take_pending();
            if ops.is_empty() && !world.registry.has_awaiting_start() {
                break;
            }
            if passes == self.max_settle_passes {
                for op in ops {
                    world.registry.push_pending(op);
                }
                self.stats.settle_overflows += 1;
                log::warn!(
                    "settle pass limit {} reached, {} changes carried over",
                    self.max_settle_passes,
                    world.registry.pending_count()
                );
                break;
            }
            for op in ops {
                self.apply(world, op);
            }
            self.start_pending(world);
            passes += 1;
        }
        passes
    }

    fn apply(&mut self, world: &mut World, op: PendingOp) {
        match op {
            PendingOp::Spawned(entity) => {
                if let Err(error) = self.assemble(world, entity) {
                    log::error!("failed to assemble entity {:?}: {}", entity, error);
                    self.configuration_errors.push(error);
                }
            }
            PendingOp::Attached(component) => self.assemble_component(world, component),
            PendingOp::Destroy(entity) => {
                for component in world.registry.components_of(entity) {
                    self.disable_now(world, component);
                }
            }
            PendingOp::DestroyComponent(component) => self.disable_now(world, component),
            PendingOp::Enable(component) => {
                if let Err(error) = self.enable(world, component) {
                    self.stats.rejected_ops += 1;
                    log::warn!("deferred enable rejected: {}", error);
                }
            }
            PendingOp::Disable(component) => {
                if let Err(error) = self.disable(world, component) {
                    self.stats.rejected_ops += 1;
                    log::warn!("deferred disable rejected: {}", error);
                }
            }
            PendingOp::SetActive(entity, active) => self.set_entity_active(world, entity, active),
            PendingOp::ReturnToPool(entity) => self.return_to_pool(world, entity),
            PendingOp::ReviveFromPool(entity) => self.revive_from_pool(world, entity),
        }
    }

    /// Check dependencies, awaken every component and enable the entity.
    ///
    /// On failure the entity is removed without ever becoming visible.
    pub fn assemble(&mut self, world: &mut World, entity: EntityId) -> Result<(), ConfigurationError> {
        let Some(record) = world.registry.get(entity) else {
            return Ok(());
        };
        if record.status() != EntityStatus::Spawning {
            return Ok(());
        }
        let components = record.components().to_vec();

        if let Err(error) = check_dependencies(world, entity, &components) {
            self.reject(world, entity, &components);
            return Err(error);
        }

        for &component in &components {
            if let Err(error) = self.awaken(world, component) {
                self.reject(world, entity, &components);
                return Err(match error {
                    LifecycleError::Configuration(config) => config,
                    other => ConfigurationError::AwakeFailed {
                        entity,
                        component: world.registry.component_name(component).unwrap_or("<unknown>"),
                        reason: other.to_string(),
                    },
                });
            }
        }

        world.registry.mark_live(entity);
        self.stats.assembled += 1;
        log::debug!(
            "assembled entity '{}' {:?} with {} components",
            world.registry.get(entity).map_or("", |record| record.name()),
            entity,
            components.len()
        );

        let active = world
            .registry
            .get(entity)
            .is_some_and(|record| record.is_active() && record.status() == EntityStatus::Live);
        if active {
            for component in components {
                let wants = world
                    .registry
                    .slot(component)
                    .is_some_and(|slot| slot.wants_enabled && slot.state == LifecycleState::Awoken);
                if wants {
                    self.enable_now(world, component);
                }
            }
        }
        Ok(())
    }

    fn reject(&mut self, world: &mut World, entity: EntityId, components: &[ComponentId]) {
        for &component in components {
            world.events.remove_owner(component);
        }
        world.registry.remove_unassembled(entity);
        self.stats.assembly_failures += 1;
    }

    fn assemble_component(&mut self, world: &mut World, component: ComponentId) {
        let Some(slot) = world.registry.slot(component) else {
            return;
        };
        if slot.state != LifecycleState::Uninitialized || slot.doomed {
            return;
        }
        let entity = slot.entity;
        let outcome = check_dependencies(world, entity, &[component])
            .map_err(LifecycleError::from)
            .and_then(|()| self.awaken(world, component));
        if let Err(error) = outcome {
            log::error!("failed to attach component {:?} to {:?}: {}", component, entity, error);
            if let LifecycleError::Configuration(config) = error {
                self.configuration_errors.push(config);
            }
            if let Some(slot) = world.registry.slot_mut(component) {
                slot.state = LifecycleState::Faulted;
            }
            let _ = world.registry.destroy_component(component);
            return;
        }
        let ready = world
            .registry
            .get(entity)
            .is_some_and(|record| record.is_active() && record.status() == EntityStatus::Live);
        let wants = world.registry.slot(component).is_some_and(|slot| slot.wants_enabled);
        if ready && wants {
            self.enable_now(world, component);
        }
    }

    fn set_entity_active(&mut self, world: &mut World, entity: EntityId, active: bool) {
        let Some(record) = world.registry.record_mut(entity) else {
            return;
        };
        if record.active == active {
            return;
        }
        record.active = active;
        let live = record.status == EntityStatus::Live;
        log::debug!("entity '{}' {:?} active = {}", record.name, entity, active);
        if !live {
            return;
        }
        for component in world.registry.components_of(entity) {
            if active {
                let wants = world.registry.slot(component).is_some_and(|slot| {
                    slot.wants_enabled
                        && !slot.doomed
                        && slot.state.can_transition_to(LifecycleState::Enabled)
                });
                if wants {
                    self.enable_now(world, component);
                }
            } else {
                self.disable_now(world, component);
            }
        }
    }

    fn return_to_pool(&mut self, world: &mut World, entity: EntityId) {
        let Some(record) = world.registry.get(entity) else {
            return;
        };
        if record.status() == EntityStatus::PendingDestroy {
            return;
        }
        let Some(membership) = record.pool() else {
            return;
        };
        self.set_entity_active(world, entity, false);
        reset_poolables(world, entity);
        world.pools.return_to_free(membership.pool, entity);
        log::trace!("entity {:?} returned to pool", entity);
    }

    fn revive_from_pool(&mut self, world: &mut World, entity: EntityId) {
        let alive = world
            .registry
            .get(entity)
            .is_some_and(|record| record.status() == EntityStatus::Live);
        if !alive {
            return;
        }
        // Poolables were reset on release; the acquirer may have configured
        // the entity since.
        self.set_entity_active(world, entity, true);
        log::trace!("entity {:?} revived from pool", entity);
    }

    /// Run `on_start` for every component enabled since the last pass
    pub fn start_pending(&mut self, world: &mut World) -> usize {
        let mut started = 0;
        for component in world.registry.take_awaiting_start() {
            let ready = world
                .registry
                .slot(component)
                .is_some_and(|slot| slot.state == LifecycleState::Enabled && !slot.started);
            if !ready {
                continue;
            }
            match self.call(world, component, HookKind::Start, 0.0) {
                Some(Err(error)) => self.fault(world, component, HookKind::Start, error),
                _ => {
                    if let Some(slot) = world.registry.slot_mut(component) {
                        slot.started = true;
                        // A disable queued by the start hook is applied later
                        if slot.state == LifecycleState::Enabled {
                            slot.state = LifecycleState::Active;
                        }
                    }
                    self.stats.started += 1;
                    started += 1;
                }
            }
        }
        started
    }

    /// Run destroy hooks for everything marked for destruction and free it
    pub fn drain(&mut self, world: &mut World) -> DrainReport {
        let mut visited: Vec<ComponentId> = Vec::new();
        for _ in 0..self.max_settle_passes {
            let mut targets = Vec::new();
            for &entity in world.registry.doomed_entities() {
                targets.extend(world.registry.components_of(entity));
            }
            targets.extend_from_slice(world.registry.doomed_components());
            targets.retain(|component| !visited.contains(component));
            if targets.is_empty() {
                break;
            }
            for component in targets {
                self.destroy_immediate(world, component);
                visited.push(component);
            }
        }

        let report = world.registry.drain_pending();
        for &(pool, entity) in &report.pooled_removed {
            world.pools.forget(pool, entity);
        }
        report
    }

    /// Destroy every entity and drain, running all disable and destroy hooks
    pub fn teardown(&mut self, world: &mut World) -> DrainReport {
        for entity in world.registry.all_entities() {
            let _ = world.registry.destroy(entity);
        }
        // Spawns queued by the teardown itself are never assembled
        let _ = world.registry.take_pending();
        let report = self.drain(world);
        let _ = world.registry.take_pending();
        report
    }
}

fn invoke(behaviour: &mut dyn Component, ctx: &mut HookContext<'_>, hook: HookKind, delta: f32) -> HookResult {
    match hook {
        HookKind::Awake => behaviour.on_awake(ctx),
        HookKind::Enable => behaviour.on_enable(ctx),
        HookKind::Start => behaviour.on_start(ctx),
        HookKind::FixedUpdate => behaviour.on_fixed_update(ctx, delta),
        HookKind::Update => behaviour.on_update(ctx, delta),
        HookKind::LateUpdate => behaviour.on_late_update(ctx, delta),
        HookKind::Disable => behaviour.on_disable(ctx),
        HookKind::Destroy => behaviour.on_destroy(ctx),
    }
}

fn check_dependencies(world: &World, entity: EntityId, components: &[ComponentId]) -> Result<(), ConfigurationError> {
    let Some(record) = world.registry.get(entity) else {
        return Ok(());
    };
    for &component in components {
        let Some(slot) = world.registry.slot(component) else {
            continue;
        };
        let Some(behaviour) = slot.behaviour.as_deref() else {
            continue;
        };
        for dependency in behaviour.dependencies() {
            if !record.siblings.contains_key(&dependency.type_id()) {
                return Err(ConfigurationError::MissingDependency {
                    entity,
                    component: slot.name,
                    dependency: dependency.name(),
                });
            }
        }
    }
    Ok(())
}

fn reset_poolables(world: &mut World, entity: EntityId) {
    for component in world.registry.components_of(entity) {
        if let Some(slot) = world.registry.slot_mut(component) {
            if slot.capabilities.contains(Capabilities::POOLABLE) {
                if let Some(behaviour) = slot.behaviour.as_deref_mut() {
                    behaviour.reset_for_pool();
                }
            }
        }
    }
}
