use std::time::Duration;

use crate::{StatusSnapshot, Task};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_TASK_CYCLES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    /// Skip fetching while a task still awaits its result.
    pub gate_on_pending_result: bool,
    /// Gated cycles after which a pending task is abandoned. 0 never abandons.
    pub stale_task_cycles: u32,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            gate_on_pending_result: true,
            stale_task_cycles: DEFAULT_STALE_TASK_CYCLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// State owned by the task coordinator. Only `update` mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollerState {
    settings: PollerSettings,
    run: RunState,
    current_task: Option<Task>,
    fetch_in_flight: bool,
    poll_scheduled: bool,
    poll_generation: u64,
    gated_cycles: u32,
}

impl PollerState {
    pub fn new(settings: PollerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_running: self.is_running(),
            current_task: self.current_task.clone(),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn is_running(&self) -> bool {
        self.run == RunState::Running
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn poll_scheduled(&self) -> bool {
        self.poll_scheduled
    }

    pub fn poll_generation(&self) -> u64 {
        self.poll_generation
    }

    pub(crate) fn set_running(&mut self, run: RunState) {
        self.run = run;
    }

    pub(crate) fn begin_fetch(&mut self) {
        self.fetch_in_flight = true;
    }

    pub(crate) fn finish_fetch(&mut self) {
        self.fetch_in_flight = false;
    }

    /// Arms a new poll timer and returns its generation. Older timers become stale.
    pub(crate) fn arm_poll(&mut self) -> u64 {
        self.poll_generation += 1;
        self.poll_scheduled = true;
        self.poll_generation
    }

    /// Invalidates any armed timer. Returns whether one was armed.
    pub(crate) fn disarm_poll(&mut self) -> bool {
        self.poll_generation += 1;
        std::mem::replace(&mut self.poll_scheduled, false)
    }

    /// Consumes the timer for `generation` if it is the armed one.
    pub(crate) fn take_due_poll(&mut self, generation: u64) -> bool {
        if self.poll_scheduled && generation == self.poll_generation {
            self.poll_scheduled = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_current_task(&mut self, task: Task) -> Option<Task> {
        self.gated_cycles = 0;
        self.current_task.replace(task)
    }

    pub(crate) fn take_current_task(&mut self) -> Option<Task> {
        self.gated_cycles = 0;
        self.current_task.take()
    }

    /// Counts one gated cycle and reports whether the pending task is now stale.
    pub(crate) fn note_gated_cycle(&mut self) -> bool {
        self.gated_cycles += 1;
        self.settings.stale_task_cycles > 0 && self.gated_cycles >= self.settings.stale_task_cycles
    }
}
