use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{count, journal, position, running_scheduler, Journal, Recorder};
use crate::core::ConfigurationError;
use crate::ecs::component::{Capabilities, Component, HookError, HookResult};
use crate::ecs::components::MovementComponent;
use crate::ecs::context::HookContext;
use crate::ecs::dispatcher::{HookKind, LifecycleDispatcher};
use crate::ecs::entity::EntityBlueprint;
use crate::ecs::lifecycle::{InvalidTransition, LifecycleError, LifecycleState};
use crate::ecs::registry::PendingOp;
use crate::ecs::world::World;
use crate::foundation::collections::EntityId;
use crate::scheduler::SchedulerError;

struct Killer {
    target: Rc<Cell<Option<EntityId>>>,
}

impl Component for Killer {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn on_update(&mut self, ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        if let Some(target) = self.target.take() {
            ctx.destroy(target).map_err(|e| HookError::failed(e.to_string()))?;
        }
        Ok(())
    }
}

struct Spawner {
    journal: Journal,
    broken: bool,
    done: bool,
}

impl Component for Spawner {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn on_update(&mut self, ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let blueprint = if self.broken {
            EntityBlueprint::new("orphan").with_component(MovementComponent::default())
        } else {
            EntityBlueprint::new("child").with_component(
                Recorder::new("child", &self.journal)
                    .with_capabilities(Capabilities::UPDATE | Capabilities::LATE_UPDATE),
            )
        };
        ctx.spawn(blueprint);
        Ok(())
    }
}

struct ScoreListener {
    received: Rc<RefCell<Vec<i64>>>,
}

impl Component for ScoreListener {
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn on_enable(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        let received = Rc::clone(&self.received);
        ctx.subscribe("score", move |event| {
            if let Some(points) = event.payload.as_int() {
                received.borrow_mut().push(points);
            }
        })
        .map_err(|e| HookError::failed(e.to_string()))?;
        Ok(())
    }
}

/// Subscribes once, from `on_awake`
struct AwakeListener {
    received: Rc<RefCell<Vec<i64>>>,
}

impl Component for AwakeListener {
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn on_awake(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        let received = Rc::clone(&self.received);
        ctx.subscribe("score", move |event| {
            if let Some(points) = event.payload.as_int() {
                received.borrow_mut().push(points);
            }
        })
        .map_err(|e| HookError::failed(e.to_string()))?;
        Ok(())
    }
}

#[test]
fn test_awake_once_before_any_frame_hook() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    scheduler
        .spawn(
            EntityBlueprint::new("ship")
                .with_component(Recorder::new("first", &journal))
                .with_component(Recorder::new("second", &journal)),
        )
        .unwrap();

    scheduler.tick(0.02).unwrap();
    scheduler.tick(0.02).unwrap();

    assert_eq!(count(&journal, "first:awake"), 1);
    assert_eq!(count(&journal, "second:awake"), 1);
    assert_eq!(count(&journal, "first:start"), 1);
    assert_eq!(count(&journal, "first:update"), 2);

    let awake = position(&journal, "first:awake").unwrap();
    let enable = position(&journal, "first:enable").unwrap();
    let start = position(&journal, "first:start").unwrap();
    let fixed = position(&journal, "first:fixed").unwrap();
    assert!(awake < enable && enable < start && start < fixed);
    assert!(position(&journal, "second:awake").unwrap() < position(&journal, "first:fixed").unwrap());
    assert!(position(&journal, "first:update").unwrap() < position(&journal, "second:update").unwrap());
    assert!(position(&journal, "second:update").unwrap() < position(&journal, "first:late").unwrap());
}

#[test]
fn test_enabling_active_component_is_illegal() {
    let mut world = World::new();
    let mut dispatcher = LifecycleDispatcher::new();
    let journal = journal();
    let entity = world.spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)));
    dispatcher.settle(&mut world);

    let id = world.registry().component_id::<Recorder>(entity).unwrap();
    assert_eq!(world.registry().component_state(id), Some(LifecycleState::Active));

    let err = dispatcher.enable(&mut world, id).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::IllegalTransition {
            source: InvalidTransition {
                from: LifecycleState::Active,
                to: LifecycleState::Enabled
            },
            ..
        }
    ));
    assert_eq!(count(&journal, "a:enable"), 1);
    assert_eq!(world.registry().component_state(id), Some(LifecycleState::Active));
}

#[test]
fn test_double_disable_is_noop() {
    let mut world = World::new();
    let mut dispatcher = LifecycleDispatcher::new();
    let journal = journal();
    let entity = world.spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)));
    dispatcher.settle(&mut world);
    let id = world.registry().component_id::<Recorder>(entity).unwrap();

    dispatcher.disable(&mut world, id).unwrap();
    dispatcher.disable(&mut world, id).unwrap();

    assert_eq!(count(&journal, "a:disable"), 1);
    assert_eq!(world.registry().component_state(id), Some(LifecycleState::Disabled));
    assert!(world.registry().for_each_active(Capabilities::UPDATE).is_empty());
}

#[test]
fn test_deferred_double_disable_is_noop() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    let entity = scheduler
        .spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)))
        .unwrap();
    scheduler.tick(0.02).unwrap();

    let id = scheduler.world().registry().component_id::<Recorder>(entity).unwrap();
    let registry = scheduler.world_mut().registry_mut();
    registry.request_disable(id).unwrap();
    registry.request_disable(id).unwrap();
    scheduler.tick(0.02).unwrap();

    assert_eq!(count(&journal, "a:disable"), 1);
    assert_eq!(count(&journal, "a:update"), 1);
}

#[test]
fn test_reenable_in_same_frame_skips_start() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    let entity = scheduler
        .spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)))
        .unwrap();
    scheduler.tick(0.02).unwrap();

    let id = scheduler.world().registry().component_id::<Recorder>(entity).unwrap();
    let registry = scheduler.world_mut().registry_mut();
    registry.request_disable(id).unwrap();
    registry.request_enable(id).unwrap();
    scheduler.tick(0.02).unwrap();

    assert_eq!(count(&journal, "a:start"), 1);
    assert_eq!(count(&journal, "a:enable"), 2);
    assert_eq!(count(&journal, "a:disable"), 1);
    assert_eq!(count(&journal, "a:update"), 2);
    assert_eq!(
        scheduler.world().registry().component_state(id),
        Some(LifecycleState::Active)
    );
}

#[test]
fn test_destroy_during_phase_keeps_snapshot() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    let target = Rc::new(Cell::new(None));
    let updates_only = Capabilities::UPDATE | Capabilities::LATE_UPDATE;

    scheduler
        .spawn(EntityBlueprint::new("killer").with_component(Killer {
            target: Rc::clone(&target),
        }))
        .unwrap();
    let victim = scheduler
        .spawn(
            EntityBlueprint::new("victim")
                .with_component(Recorder::new("victim", &journal).with_capabilities(updates_only)),
        )
        .unwrap();
    scheduler
        .spawn(
            EntityBlueprint::new("bystander")
                .with_component(Recorder::new("bystander", &journal).with_capabilities(updates_only)),
        )
        .unwrap();
    target.set(Some(victim));

    let report = scheduler.tick(0.02).unwrap();

    assert_eq!(count(&journal, "victim:update"), 1);
    assert_eq!(count(&journal, "victim:late"), 0);
    assert_eq!(count(&journal, "bystander:update"), 1);
    assert_eq!(count(&journal, "bystander:late"), 1);
    assert!(position(&journal, "victim:disable").unwrap() < position(&journal, "victim:destroy").unwrap());
    assert_eq!(report.entities_removed, 1);
    assert!(!scheduler.world().registry().contains(victim));
    assert_eq!(scheduler.world().registry().len(), 2);
}

#[test]
fn test_spawn_from_hook_visible_next_phase() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    scheduler
        .spawn(EntityBlueprint::new("spawner").with_component(Spawner {
            journal: Rc::clone(&journal),
            broken: false,
            done: false,
        }))
        .unwrap();

    scheduler.tick(0.02).unwrap();
    assert_eq!(
        *journal.borrow(),
        vec!["child:awake", "child:enable", "child:start", "child:late"]
    );

    scheduler.tick(0.02).unwrap();
    assert_eq!(count(&journal, "child:update"), 1);
    assert_eq!(count(&journal, "child:late"), 2);
    assert_eq!(scheduler.world().registry().len(), 2);
}

#[test]
fn test_spawn_from_hook_with_missing_dependency_is_reported() {
    let mut scheduler = running_scheduler();
    scheduler
        .spawn(EntityBlueprint::new("spawner").with_component(Spawner {
            journal: journal(),
            broken: true,
            done: false,
        }))
        .unwrap();

    let report = scheduler.tick(0.02).unwrap();
    assert_eq!(report.configuration_errors, 1);
    assert_eq!(scheduler.world().registry().len(), 1);
    assert_eq!(scheduler.world().registry().stored_entities(), 1);
}

#[test]
fn test_missing_dependency_rejects_entity() {
    let mut scheduler = running_scheduler();
    let err = scheduler
        .spawn(EntityBlueprint::new("rock").with_component(MovementComponent::default()))
        .unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::Configuration(ConfigurationError::MissingDependency { component: "Movement", .. })
    ));
    assert_eq!(scheduler.world().registry().stored_entities(), 0);
}

#[test]
fn test_awake_failure_rejects_entity() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    let err = scheduler
        .spawn(
            EntityBlueprint::new("ship")
                .with_component(Recorder::new("bad", &journal).failing_on(HookKind::Awake)),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::Configuration(ConfigurationError::AwakeFailed { component: "bad", .. })
    ));
    assert_eq!(*journal.borrow(), vec!["bad:awake"]);
    assert!(scheduler.world().registry().is_empty());

    scheduler.tick(0.02).unwrap();
    assert_eq!(journal.borrow().len(), 1);
}

#[test]
fn test_fault_isolates_component() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    scheduler
        .spawn(
            EntityBlueprint::new("ship")
                .with_component(Recorder::new("bad", &journal).failing_on(HookKind::Update))
                .with_component(Recorder::new("good", &journal)),
        )
        .unwrap();

    let report = scheduler.tick(0.02).unwrap();
    assert_eq!(report.faults, 1);
    scheduler.tick(0.02).unwrap();

    assert_eq!(count(&journal, "bad:update"), 1);
    assert_eq!(count(&journal, "bad:late"), 0);
    assert_eq!(count(&journal, "good:update"), 2);
    let faults = scheduler.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].hook, HookKind::Update);
    assert_eq!(faults[0].component_name, "bad");
    assert_eq!(faults[0].frame, 1);

    scheduler.stop().unwrap();
    assert_eq!(count(&journal, "bad:disable"), 0);
    assert_eq!(count(&journal, "bad:destroy"), 0);
    assert_eq!(count(&journal, "good:destroy"), 1);
}

#[test]
fn test_inactive_entity_waits_for_activation() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    let entity = scheduler
        .spawn(
            EntityBlueprint::new("idle")
                .inactive()
                .with_component(Recorder::new("idle", &journal)),
        )
        .unwrap();
    scheduler.tick(0.02).unwrap();
    assert_eq!(*journal.borrow(), vec!["idle:awake"]);

    scheduler
        .world_mut()
        .registry_mut()
        .request_set_active(entity, true)
        .unwrap();
    scheduler.tick(0.02).unwrap();
    assert_eq!(
        *journal.borrow(),
        vec!["idle:awake", "idle:enable", "idle:start", "idle:fixed", "idle:update", "idle:late"]
    );

    scheduler
        .world_mut()
        .registry_mut()
        .request_set_active(entity, false)
        .unwrap();
    scheduler.tick(0.02).unwrap();
    assert_eq!(count(&journal, "idle:disable"), 1);
    assert_eq!(count(&journal, "idle:update"), 1);
}

#[test]
fn test_disabled_subscriber_not_called() {
    let mut scheduler = running_scheduler();
    let received = Rc::new(RefCell::new(Vec::new()));
    let entity = scheduler
        .spawn(EntityBlueprint::new("hud").with_component(ScoreListener {
            received: Rc::clone(&received),
        }))
        .unwrap();

    assert_eq!(scheduler.world_mut().events_mut().publish("score", 10), 1);
    assert_eq!(*received.borrow(), vec![10]);

    let id = scheduler.world().registry().component_id::<ScoreListener>(entity).unwrap();
    scheduler.world_mut().registry_mut().request_disable(id).unwrap();
    scheduler.tick(0.016).unwrap();

    assert_eq!(scheduler.world_mut().events_mut().publish("score", 10), 0);
    assert_eq!(*received.borrow(), vec![10]);
    assert_eq!(scheduler.world().events().stats().skipped_stale, 1);
}

#[test]
fn test_destroy_removes_subscriptions() {
    let mut scheduler = running_scheduler();
    let received = Rc::new(RefCell::new(Vec::new()));
    let entity = scheduler
        .spawn(EntityBlueprint::new("hud").with_component(ScoreListener {
            received: Rc::clone(&received),
        }))
        .unwrap();
    assert_eq!(scheduler.world().events().subscription_count(), 1);

    scheduler.world_mut().registry_mut().destroy(entity).unwrap();
    scheduler.tick(0.016).unwrap();

    assert_eq!(scheduler.world().events().subscription_count(), 0);
    assert!(received.borrow().is_empty());
}

#[test]
fn test_stop_runs_disable_then_destroy() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    scheduler
        .spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)))
        .unwrap();
    scheduler.tick(0.02).unwrap();
    scheduler.stop().unwrap();

    let disable = position(&journal, "a:disable").unwrap();
    let destroy = position(&journal, "a:destroy").unwrap();
    assert!(disable < destroy);
    assert_eq!(journal.borrow().last().map(String::as_str), Some("a:destroy"));
    assert!(scheduler.world().registry().is_empty());
}

#[test]
fn test_subscription_of_disabled_component_waits_for_enable() {
    let mut scheduler = running_scheduler();
    let received = Rc::new(RefCell::new(Vec::new()));
    let entity = scheduler
        .spawn(EntityBlueprint::new("hud").with_disabled_component(AwakeListener {
            received: Rc::clone(&received),
        }))
        .unwrap();
    scheduler.tick(0.016).unwrap();

    let id = scheduler.world().registry().component_id::<AwakeListener>(entity).unwrap();
    assert_eq!(scheduler.world().registry().component_state(id), Some(LifecycleState::Awoken));
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 10), 0);
    assert!(received.borrow().is_empty());

    scheduler.world_mut().registry_mut().request_enable(id).unwrap();
    scheduler.tick(0.016).unwrap();
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 11), 1);

    scheduler.world_mut().registry_mut().request_disable(id).unwrap();
    scheduler.tick(0.016).unwrap();
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 12), 0);

    // An awake-time subscription follows every enabled window
    scheduler.world_mut().registry_mut().request_enable(id).unwrap();
    scheduler.tick(0.016).unwrap();
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 13), 1);

    assert_eq!(*received.borrow(), vec![11, 13]);
    assert_eq!(scheduler.world().events().subscription_count(), 1);
}

#[test]
fn test_pool_cycles_do_not_accumulate_subscriptions() {
    let mut scheduler = running_scheduler();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    scheduler
        .register_pool("hud", move || {
            EntityBlueprint::new("hud").with_component(ScoreListener {
                received: Rc::clone(&sink),
            })
        })
        .unwrap();

    for _ in 0..20 {
        let entity = scheduler.world_mut().acquire_pooled("hud").unwrap();
        scheduler.tick(0.016).unwrap();
        scheduler.world_mut().release_to_pool(entity).unwrap();
        scheduler.tick(0.016).unwrap();
        assert!(scheduler.world().events().subscription_count() <= 1);
    }
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 5), 0);

    scheduler.world_mut().acquire_pooled("hud").unwrap();
    scheduler.tick(0.016).unwrap();
    assert_eq!(scheduler.world().events().subscription_count(), 1);
    assert_eq!(scheduler.world_mut().events_mut().publish("score", 6), 1);
    assert_eq!(*received.borrow(), vec![6]);
}

#[test]
fn test_register_pool_does_not_start_earlier_spawns() {
    let mut scheduler = running_scheduler();
    let journal = journal();
    scheduler
        .spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)))
        .unwrap();
    scheduler
        .register_pool("spares", || EntityBlueprint::new("spare"))
        .unwrap();
    scheduler
        .spawn(EntityBlueprint::new("b").with_component(Recorder::new("b", &journal)))
        .unwrap();

    assert_eq!(*journal.borrow(), vec!["a:awake", "a:enable", "b:awake", "b:enable"]);

    scheduler.tick(0.02).unwrap();
    assert!(position(&journal, "b:awake").unwrap() < position(&journal, "a:start").unwrap());
    assert_eq!(count(&journal, "a:start"), 1);
}

#[test]
fn test_deferred_toggle_of_removed_component_is_rejected() {
    let mut world = World::new();
    let mut dispatcher = LifecycleDispatcher::new();
    let journal = journal();
    let entity = world.spawn(EntityBlueprint::new("a").with_component(Recorder::new("a", &journal)));
    dispatcher.settle(&mut world);
    let id = world.registry().component_id::<Recorder>(entity).unwrap();

    world.registry_mut().destroy(entity).unwrap();
    dispatcher.settle(&mut world);
    dispatcher.drain(&mut world);
    assert_eq!(world.registry().component_state(id), None);

    world.registry.push_pending(PendingOp::Disable(id));
    world.registry.push_pending(PendingOp::Enable(id));
    dispatcher.settle(&mut world);
    assert_eq!(dispatcher.stats().rejected_ops, 2);
}
