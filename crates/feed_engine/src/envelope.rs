use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::JobPayload;

const HEARTBEAT_TYPE: &str = "ping";
const CONNECTED_TYPE: &str = "connected";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a json object")]
    NotAnObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("payload of `{kind}` does not match its schema: {message}")]
    InvalidPayload { kind: String, message: String },
}

/// One decoded push message: a type discriminator plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Value,
}

impl Envelope {
    /// Payload is the `data` member when present, otherwise every field but `type`.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotAnObject);
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(DecodeError::MissingType),
        };
        let payload = if kind == HEARTBEAT_TYPE || kind == CONNECTED_TYPE {
            Value::Null
        } else {
            match fields.remove("data") {
                Some(data) => data,
                None => Value::Object(fields),
            }
        };
        Ok(Self { kind, payload })
    }
}

/// The fixed table of business events the dashboard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UpdateDetected,
    UpdateApplied,
    UpdateApplyFailed,
    ContainerRestarted,
    HealthCheckFailed,
    JobCreated,
    JobStarted,
    JobProgress,
    JobCompleted,
    JobFailed,
    JobCanceled,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::UpdateDetected,
        EventKind::UpdateApplied,
        EventKind::UpdateApplyFailed,
        EventKind::ContainerRestarted,
        EventKind::HealthCheckFailed,
        EventKind::JobCreated,
        EventKind::JobStarted,
        EventKind::JobProgress,
        EventKind::JobCompleted,
        EventKind::JobFailed,
        EventKind::JobCanceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::UpdateDetected => "update-detected",
            EventKind::UpdateApplied => "update-applied",
            EventKind::UpdateApplyFailed => "update-apply-failed",
            EventKind::ContainerRestarted => "container-restarted",
            EventKind::HealthCheckFailed => "health-check-failed",
            EventKind::JobCreated => "job-created",
            EventKind::JobStarted => "job-started",
            EventKind::JobProgress => "job-progress",
            EventKind::JobCompleted => "job-completed",
            EventKind::JobFailed => "job-failed",
            EventKind::JobCanceled => "job-canceled",
        }
    }

    pub fn from_wire(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == kind)
    }

    pub fn is_job_event(self) -> bool {
        matches!(
            self,
            EventKind::JobCreated
                | EventKind::JobStarted
                | EventKind::JobProgress
                | EventKind::JobCompleted
                | EventKind::JobFailed
                | EventKind::JobCanceled
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Initial acknowledgment sent by the server after the stream opens.
    Connected,
    Heartbeat,
    Business { kind: EventKind, payload: Value },
    Unknown { kind: String, payload: Value },
}

impl StreamEvent {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(Self::from_envelope(Envelope::decode(raw)?))
    }

    pub fn from_envelope(envelope: Envelope) -> Self {
        let business = match envelope.kind.as_str() {
            HEARTBEAT_TYPE => return StreamEvent::Heartbeat,
            CONNECTED_TYPE => return StreamEvent::Connected,
            other => EventKind::from_wire(other),
        };
        match business {
            Some(kind) => StreamEvent::Business {
                kind,
                payload: envelope.payload,
            },
            None => StreamEvent::Unknown {
                kind: envelope.kind,
                payload: envelope.payload,
            },
        }
    }

    /// Typed job fields for `job-*` events. `None` for every other event.
    pub fn job_payload(&self) -> Option<Result<JobPayload, DecodeError>> {
        match self {
            StreamEvent::Business { kind, payload } if kind.is_job_event() => {
                Some(JobPayload::deserialize(payload).map_err(|err| {
                    DecodeError::InvalidPayload {
                        kind: kind.as_str().to_string(),
                        message: err.to_string(),
                    }
                }))
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct TypeOnly {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Cheap check used by the connection manager to drop liveness pings.
pub fn is_heartbeat(raw: &str) -> bool {
    serde_json::from_str::<TypeOnly>(raw)
        .ok()
        .and_then(|head| head.kind)
        .is_some_and(|kind| kind == HEARTBEAT_TYPE)
}
