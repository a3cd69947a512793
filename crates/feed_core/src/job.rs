pub type JobId = u64;

/// Which background job a slot tracks. Both kinds follow the same lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobKind {
    #[default]
    Check,
    DependencyScan,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Check, JobKind::DependencyScan];

    pub fn label(self) -> &'static str {
        match self {
            JobKind::Check => "Update check",
            JobKind::DependencyScan => "Dependency scan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Done,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Lifecycle push events that concern a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    Created,
    Started,
    Progress,
    Completed,
    Failed,
    Canceled,
}

/// A partial view of a job, as reported by a push event or a REST status read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: Option<JobStatus>,
    pub total_count: Option<u64>,
    pub processed_count: Option<u64>,
    pub items_found_count: Option<u64>,
    pub errors_count: Option<u64>,
    pub current_item: Option<String>,
    pub progress_percent: Option<f64>,
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total_count: u64,
    pub processed_count: u64,
    pub items_found_count: u64,
    pub errors_count: u64,
    pub current_item: Option<String>,
    pub progress_percent: f64,
    pub error: Option<String>,
    /// A cancel was acknowledged by the server but no terminal event arrived yet.
    pub cancel_requested: bool,
}

impl JobState {
    pub fn seeded(kind: JobKind, job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            kind,
            status,
            total_count: 0,
            processed_count: 0,
            items_found_count: 0,
            errors_count: 0,
            current_item: None,
            progress_percent: 0.0,
            error: None,
            cancel_requested: false,
        }
    }

    /// Builds state from a snapshot. Terminal statuses are not taken from the
    /// snapshot here; callers run them through [`JobState::finish`] so that the
    /// terminal side effects stay in one place.
    pub(crate) fn from_snapshot(kind: JobKind, snapshot: &JobSnapshot, fallback: JobStatus) -> Self {
        let status = snapshot
            .status
            .filter(|status| !status.is_terminal())
            .unwrap_or(fallback);
        let mut job = Self::seeded(kind, snapshot.job_id, status);
        job.merge(snapshot);
        job
    }

    /// Monotonic merge: re-applying a snapshot that is already reflected is a no-op.
    pub(crate) fn merge(&mut self, snapshot: &JobSnapshot) {
        let behind = snapshot
            .processed_count
            .is_some_and(|processed| processed < self.processed_count);

        if let Some(total) = snapshot.total_count {
            self.total_count = self.total_count.max(total);
        }
        if let Some(processed) = snapshot.processed_count {
            self.processed_count = self.processed_count.max(processed);
        }
        if let Some(found) = snapshot.items_found_count {
            self.items_found_count = self.items_found_count.max(found);
        }
        if let Some(errors) = snapshot.errors_count {
            self.errors_count = self.errors_count.max(errors);
        }
        if let Some(item) = snapshot.current_item.as_ref().filter(|_| !behind) {
            self.current_item = Some(item.clone());
        }
        if let Some(error) = &snapshot.error {
            self.error = Some(error.clone());
        }

        let incoming = snapshot
            .progress_percent
            .map(clamp_percent)
            .or_else(|| derived_percent(self.processed_count, self.total_count));
        if let Some(percent) = incoming {
            self.progress_percent = self.progress_percent.max(percent);
        }
    }

    /// Applies a non-terminal event. Returns whether anything changed.
    pub(crate) fn advance(&mut self, status: JobStatus, snapshot: &JobSnapshot) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let before = self.clone();
        if status == JobStatus::Running {
            self.status = JobStatus::Running;
        }
        self.merge(snapshot);
        *self != before
    }

    /// Applies a terminal event. Returns `false` when the job already reached a
    /// terminal state, which makes repeated delivery a no-op.
    pub(crate) fn finish(&mut self, status: JobStatus, snapshot: &JobSnapshot) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.merge(snapshot);
        self.status = status;
        self.cancel_requested = false;
        match status {
            JobStatus::Done => {
                self.total_count = self.total_count.max(self.processed_count);
                self.progress_percent = 100.0;
                self.current_item = None;
            }
            JobStatus::Canceled => {
                self.current_item = None;
            }
            _ => {}
        }
        true
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn derived_percent(processed: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(clamp_percent(processed as f64 * 100.0 / total as f64))
}
