use scout_logging::{scout_debug, scout_info, scout_warn};

use crate::{Effect, Msg, PollerState, RunState, TaskResult};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: PollerState, msg: Msg) -> (PollerState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartPolling => {
            if state.is_running() {
                scout_debug!("Start requested while already running; keeping existing loop");
                return (state, Vec::new());
            }
            state.set_running(RunState::Running);
            scout_info!("Polling started");
            if state.fetch_in_flight() {
                // The in-flight fetch schedules the next poll when it lands.
                Vec::new()
            } else {
                begin_cycle(&mut state)
            }
        }
        Msg::StopPolling => {
            if !state.is_running() {
                return (state, Vec::new());
            }
            state.set_running(RunState::Stopped);
            scout_info!("Polling stopped");
            if state.disarm_poll() {
                vec![Effect::CancelScheduledPoll]
            } else {
                Vec::new()
            }
        }
        Msg::PollDue { generation } => {
            if !state.take_due_poll(generation) || !state.is_running() {
                scout_debug!("Ignoring stale poll timer generation={}", generation);
                return (state, Vec::new());
            }
            begin_cycle(&mut state)
        }
        Msg::TaskFetched(task) => {
            state.finish_fetch();
            let mut effects = Vec::with_capacity(2);
            if let Some(task) = task {
                scout_info!("Task received job_id={} company={}", task.job_id, task.company);
                if let Some(previous) = state.set_current_task(task.clone()) {
                    scout_warn!(
                        "Task job_id={} replaced job_id={} before its result arrived",
                        task.job_id,
                        previous.job_id
                    );
                }
                effects.push(Effect::DispatchTask(task));
            } else {
                scout_debug!("No pending task");
            }
            if state.is_running() {
                effects.push(schedule_next(&mut state));
            }
            effects
        }
        Msg::ContactsScraped { job_id, contacts } => {
            let Some(current) = state.current_task() else {
                scout_warn!(
                    "Discarding {} scraped contact(s): no current task",
                    contacts.len()
                );
                return (state, Vec::new());
            };
            if let Some(job_id) = job_id.filter(|id| *id != current.job_id) {
                scout_warn!(
                    "Discarding {} scraped contact(s) for job_id={}: current task is job_id={}",
                    contacts.len(),
                    job_id,
                    current.job_id
                );
                return (state, Vec::new());
            }
            match state.take_current_task() {
                Some(task) => {
                    let result = TaskResult::new(task.job_id, contacts);
                    scout_info!(
                        "Reporting {} contact(s) for job_id={} status={:?}",
                        result.contacts.len(),
                        result.job_id,
                        result.status
                    );
                    vec![Effect::SubmitResult(result)]
                }
                None => Vec::new(),
            }
        }
    };

    (state, effects)
}

fn begin_cycle(state: &mut PollerState) -> Vec<Effect> {
    if state.settings().gate_on_pending_result {
        if let Some(task) = state.current_task() {
            let job_id = task.job_id.clone();
            if state.note_gated_cycle() {
                scout_warn!("Abandoning stale task job_id={}; no result arrived", job_id);
                state.take_current_task();
            } else {
                scout_debug!("Task job_id={} still pending; skipping fetch", job_id);
                return vec![schedule_next(state)];
            }
        }
    }
    state.begin_fetch();
    vec![Effect::FetchNextTask]
}

fn schedule_next(state: &mut PollerState) -> Effect {
    let generation = state.arm_poll();
    Effect::SchedulePoll {
        generation,
        after: state.settings().poll_interval,
    }
}
