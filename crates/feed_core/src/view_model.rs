use crate::{ConnectionStatus, JobId, JobKind, JobState, JobStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedViewModel {
    pub connection: ConnectionStatus,
    pub check: Option<JobProgressView>,
    pub dependency_scan: Option<JobProgressView>,
    /// A check is running server-side and its state is still being loaded.
    pub check_awaiting_seed: bool,
    pub scan_awaiting_seed: bool,
}

impl FeedViewModel {
    pub fn job(&self, kind: JobKind) -> Option<&JobProgressView> {
        match kind {
            JobKind::Check => self.check.as_ref(),
            JobKind::DependencyScan => self.dependency_scan.as_ref(),
        }
    }

    pub fn is_busy(&self, kind: JobKind) -> bool {
        let awaiting = match kind {
            JobKind::Check => self.check_awaiting_seed,
            JobKind::DependencyScan => self.scan_awaiting_seed,
        };
        awaiting || self.job(kind).is_some_and(|job| !job.status.is_terminal())
    }
}

/// What a progress bar renders for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgressView {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub processed: u64,
    pub total: u64,
    pub items_found: u64,
    pub errors: u64,
    pub current_item: Option<String>,
    pub percent: u8,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub can_cancel: bool,
    pub can_dismiss: bool,
}

impl JobProgressView {
    pub(crate) fn from_job(job: &JobState) -> Self {
        let terminal = job.status.is_terminal();
        Self {
            job_id: job.job_id,
            kind: job.kind,
            status: job.status,
            processed: job.processed_count,
            total: job.total_count,
            items_found: job.items_found_count,
            errors: job.errors_count,
            current_item: job.current_item.clone(),
            percent: job.progress_percent.clamp(0.0, 100.0).round() as u8,
            error: job.error.clone(),
            cancel_requested: job.cancel_requested,
            can_cancel: !terminal && !job.cancel_requested,
            can_dismiss: terminal,
        }
    }

    /// `processed/total`, or just `processed` while the total is unknown.
    pub fn progress_label(&self) -> String {
        if self.total == 0 {
            self.processed.to_string()
        } else {
            format!("{}/{}", self.processed, self.total)
        }
    }
}
