use crate::{Contact, JobId, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Client asked the poller to run.
    StartPolling,
    /// Client asked the poller to stop scheduling fetches.
    StopPolling,
    /// A scheduled poll timer fired.
    PollDue { generation: u64 },
    /// The backend fetch finished; `None` covers both "no task" and failures.
    TaskFetched(Option<Task>),
    /// A page scraper reported contacts. `job_id` names the task the tab was
    /// opened for; `None` means the sender could not tell.
    ContactsScraped {
        job_id: Option<JobId>,
        contacts: Vec<Contact>,
    },
}
