//! Leadscout core: domain types, search URL building, message contract and
//! the pure poller state machine.
mod effect;
mod msg;
mod protocol;
mod search;
mod state;
mod task;
mod update;

pub use effect::Effect;
pub use msg::Msg;
pub use protocol::{Ack, AckStatus, Request, Response, StatusSnapshot};
pub use search::{
    build_search_url, recruiter_titles_for, search_filters, OrganizationFilter,
    ORGANIZATION_DOMAIN_PARAM, ORGANIZATION_NAME_PARAM, PEOPLE_ROUTE, PERSON_TITLE_PARAM,
};
pub use state::{
    PollerSettings, PollerState, RunState, DEFAULT_POLL_INTERVAL, DEFAULT_STALE_TASK_CYCLES,
};
pub use task::{
    is_plausible_email, Contact, Department, JobId, ResultStatus, SearchMode, Task, TaskResult,
};
pub use update::update;
