use crate::{JobId, JobKind, Notification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Read the job through REST and feed the result back as `Msg::JobStatusFetched`.
    FetchJobStatus { kind: JobKind, job_id: JobId },
    /// Reload the REST-backed container and update lists.
    RefreshLists { kind: JobKind },
    Notify(Notification),
}
