use crate::{ConnectionStatus, JobEventKind, JobId, JobKind, JobSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// REST start call returned.
    JobStartResponded {
        kind: JobKind,
        job_id: JobId,
        already_running: bool,
    },
    /// REST status read returned.
    JobStatusFetched { kind: JobKind, snapshot: JobSnapshot },
    /// REST status read failed.
    JobStatusFetchFailed {
        kind: JobKind,
        job_id: JobId,
        reason: String,
    },
    /// Push event for a job.
    JobEvent {
        kind: JobKind,
        event: JobEventKind,
        snapshot: JobSnapshot,
    },
    /// Server acknowledged a cancel request. The outcome arrives later.
    CancelAcknowledged { kind: JobKind, job_id: JobId },
    /// User acknowledged a finished job.
    Dismissed { kind: JobKind },
    /// Stream connection state changed. `epoch` counts successful opens, so
    /// every new connection carries a distinct value.
    ConnectionChanged {
        status: ConnectionStatus,
        epoch: u64,
    },
}
