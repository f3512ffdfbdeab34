use std::time::Duration;

use crate::{Task, TaskResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchNextTask,
    SchedulePoll { generation: u64, after: Duration },
    CancelScheduledPoll,
    DispatchTask(Task),
    SubmitResult(TaskResult),
}
