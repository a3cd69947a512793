//! Feed engine: push stream connection, envelope decoding and REST job calls.
mod backoff;
mod connection;
mod envelope;
mod jobs_api;
mod sse;
mod transport;
mod types;

pub use backoff::Backoff;
pub use connection::{ConnectionManager, ConnectionState, StreamHandle, StreamSettings};
pub use envelope::{is_heartbeat, DecodeError, Envelope, EventKind, StreamEvent};
pub use jobs_api::{ApiSettings, JobsApi, ReqwestJobsApi};
pub use sse::{SseDecoder, SseFrame, SseTransport};
pub use transport::{MessageStream, Transport};
pub use types::{
    ApiError, ConnectionStatus, JobId, JobKind, JobPayload, JobPhase, StartJobResponse,
    TransportError,
};
