use std::time::Duration;

use leadscout_core::{JobId, Task, TaskResult};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::{BackendError, FailureKind};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api/apollo";

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Base URL; `task/next` and `task/complete` are resolved below it.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Acknowledgement returned by `POST task/complete`. Decoded leniently.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CompletionAck {
    pub status: String,
    pub job_id: Option<JobId>,
    pub contacts_saved: Option<u64>,
    pub message: Option<String>,
}

#[async_trait::async_trait]
pub trait TaskBackend: Send + Sync {
    /// Next pending task, or `None` when the queue is empty.
    async fn next_task(&self) -> Result<Option<Task>, BackendError>;

    async fn complete_task(&self, result: &TaskResult) -> Result<CompletionAck, BackendError>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum NextTaskEnvelope {
    TaskFound { task: Task },
    NoTask,
    Error {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    next_url: reqwest::Url,
    complete_url: reqwest::Url,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, BackendError> {
        let base = settings.base_url.trim_end_matches('/');
        let next_url = parse_endpoint(&format!("{base}/task/next"))?;
        let complete_url = parse_endpoint(&format!("{base}/task/complete"))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BackendError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            next_url,
            complete_url,
        })
    }

    async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>, BackendError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl TaskBackend for ReqwestBackend {
    async fn next_task(&self) -> Result<Option<Task>, BackendError> {
        let response = self
            .client
            .get(self.next_url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = Self::read_success_body(response).await?;

        let envelope: NextTaskEnvelope = serde_json::from_slice(&body)
            .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))?;
        match envelope {
            NextTaskEnvelope::TaskFound { task } => Ok(Some(task)),
            NextTaskEnvelope::NoTask => Ok(None),
            NextTaskEnvelope::Error { message } => {
                Err(BackendError::new(FailureKind::Rejected, message))
            }
        }
    }

    async fn complete_task(&self, result: &TaskResult) -> Result<CompletionAck, BackendError> {
        let payload = serde_json::to_vec(result)
            .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))?;
        let response = self
            .client
            .post(self.complete_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = Self::read_success_body(response).await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(CompletionAck::default());
        }
        let ack: CompletionAck = serde_json::from_slice(&body)
            .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))?;
        if ack.status == "error" {
            return Err(BackendError::new(
                FailureKind::Rejected,
                ack.message.unwrap_or_default(),
            ));
        }
        Ok(ack)
    }
}

fn parse_endpoint(raw: &str) -> Result<reqwest::Url, BackendError> {
    reqwest::Url::parse(raw).map_err(|err| BackendError::new(FailureKind::InvalidUrl, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::new(FailureKind::Timeout, err.to_string());
    }
    BackendError::new(FailureKind::Network, err.to_string())
}
