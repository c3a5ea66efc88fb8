//! Scenario tests that drive whole frames through the scheduler

mod lifecycle_scenarios;

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::SchedulerConfig;
use crate::ecs::component::{Capabilities, Component, HookError, HookResult};
use crate::ecs::context::HookContext;
use crate::ecs::dispatcher::HookKind;
use crate::scheduler::SchedulerCore;

/// Shared log of hook calls, as `label:hook`
pub(super) type Journal = Rc<RefCell<Vec<String>>>;

pub(super) fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub(super) fn count(journal: &Journal, entry: &str) -> usize {
    journal.borrow().iter().filter(|e| *e == entry).count()
}

pub(super) fn position(journal: &Journal, entry: &str) -> Option<usize> {
    journal.borrow().iter().position(|e| e == entry)
}

/// Component that records every hook it receives
pub(super) struct Recorder {
    label: &'static str,
    journal: Journal,
    capabilities: Capabilities,
    fail_on: Option<HookKind>,
}

impl Recorder {
    pub(super) fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            journal: Rc::clone(journal),
            capabilities: Capabilities::FIXED_UPDATE | Capabilities::UPDATE | Capabilities::LATE_UPDATE,
            fail_on: None,
        }
    }

    pub(super) fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub(super) fn failing_on(mut self, hook: HookKind) -> Self {
        self.fail_on = Some(hook);
        self
    }

    fn record(&self, hook: HookKind, name: &str) -> HookResult {
        self.journal.borrow_mut().push(format!("{}:{}", self.label, name));
        if self.fail_on == Some(hook) {
            return Err(HookError::failed(format!("{} failed in {}", self.label, name)));
        }
        Ok(())
    }
}

impl Component for Recorder {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn name(&self) -> &'static str {
        self.label
    }

    fn on_awake(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.record(HookKind::Awake, "awake")
    }

    fn on_enable(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.record(HookKind::Enable, "enable")
    }

    fn on_start(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.record(HookKind::Start, "start")
    }

    fn on_fixed_update(&mut self, _ctx: &mut HookContext<'_>, _fixed_delta: f32) -> HookResult {
        self.record(HookKind::FixedUpdate, "fixed")
    }

    fn on_update(&mut self, _ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        self.record(HookKind::Update, "update")
    }

    fn on_late_update(&mut self, _ctx: &mut HookContext<'_>, _frame_delta: f32) -> HookResult {
        self.record(HookKind::LateUpdate, "late")
    }

    fn on_disable(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.record(HookKind::Disable, "disable")
    }

    fn on_destroy(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        self.record(HookKind::Destroy, "destroy")
    }
}

/// Running scheduler with 20 ms fixed steps and a cap of 5
pub(super) fn running_scheduler() -> SchedulerCore {
    scheduler_with(SchedulerConfig::new().with_fixed_delta_time(0.02).with_max_fixed_steps(5))
}

pub(super) fn scheduler_with(config: SchedulerConfig) -> SchedulerCore {
    let mut scheduler = SchedulerCore::new(config).unwrap();
    scheduler.start().unwrap();
    scheduler
}
