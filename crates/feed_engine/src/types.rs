use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    #[default]
    Check,
    #[serde(alias = "dependency-scan")]
    DependencyScan,
}

impl JobKind {
    /// Path segment of the REST job resource.
    pub fn path_segment(self) -> &'static str {
        match self {
            JobKind::Check => "check",
            JobKind::DependencyScan => "dependency-scan",
        }
    }
}

/// Job status as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[serde(alias = "pending")]
    Queued,
    Running,
    #[serde(alias = "completed", alias = "complete")]
    Done,
    Failed,
    #[serde(alias = "cancelled")]
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Job fields carried by `job-*` push events and returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub job_type: Option<JobKind>,
    #[serde(default)]
    pub status: Option<JobPhase>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default, alias = "processed_count", alias = "scanned_count")]
    pub checked_count: Option<u64>,
    #[serde(default, alias = "items_found")]
    pub updates_found: Option<u64>,
    #[serde(default)]
    pub errors_count: Option<u64>,
    #[serde(default, alias = "current_item")]
    pub current_container: Option<String>,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        self.job_type.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: JobId,
    #[serde(default)]
    pub already_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("stream endpoint answered http status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("stream closed by server")]
    Closed,
    #[error("no message within {timeout_ms} ms")]
    Stalled { timeout_ms: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    Http(u16),
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}
