//! Message contract between the coordinator and its clients (status relay,
//! page scrapers). Requests are decoded once at the boundary into [`Request`].

use serde::{Deserialize, Serialize};

use crate::{Contact, JobId, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    StartPolling,
    StopPolling,
    GetStatus,
    ContactsScraped {
        #[serde(default)]
        contacts: Vec<Contact>,
        /// Task the contacts were scraped for. Batches for any other task are dropped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
    TriggerScrape,
}

impl Request {
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Snapshot of the poller's run state as reported to `GET_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub current_task: Option<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Started,
    Stopped,
    Submitted,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ack(Ack),
    Status(StatusSnapshot),
}

impl Response {
    pub fn ack(status: AckStatus) -> Self {
        Response::Ack(Ack {
            status,
            count: None,
        })
    }

    pub fn scrape_complete(count: Option<usize>) -> Self {
        Response::Ack(Ack {
            status: AckStatus::Complete,
            count,
        })
    }

    pub fn encode(&self) -> String {
        // Plain data only; serialization is infallible.
        serde_json::to_string(self).unwrap_or_default()
    }
}
