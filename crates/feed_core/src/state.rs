use crate::view_model::{FeedViewModel, JobProgressView};
use crate::{JobId, JobKind, JobState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    /// The first open is in flight from the moment the feed starts.
    #[default]
    Reconnecting,
}

/// Reconciler state for one job kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobSlot {
    job: Option<JobState>,
    /// Job reported as already running; its state comes from a REST read.
    awaiting_seed: Option<JobId>,
    /// Last dismissed job. Late events for it must not resurrect it.
    retired: Option<JobId>,
}

impl JobSlot {
    pub fn job(&self) -> Option<&JobState> {
        self.job.as_ref()
    }

    pub fn awaiting_seed(&self) -> Option<JobId> {
        self.awaiting_seed
    }

    /// The job identity this slot accepts events for.
    pub fn tracked_id(&self) -> Option<JobId> {
        self.job.as_ref().map(|job| job.job_id).or(self.awaiting_seed)
    }

    pub fn has_active_job(&self) -> bool {
        self.awaiting_seed.is_some()
            || self
                .job
                .as_ref()
                .is_some_and(|job| !job.status.is_terminal())
    }

    pub(crate) fn is_retired(&self, job_id: JobId) -> bool {
        self.retired == Some(job_id)
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut JobState> {
        self.job.as_mut()
    }

    pub(crate) fn install(&mut self, job: JobState) {
        self.awaiting_seed = None;
        self.job = Some(job);
    }

    pub(crate) fn await_seed(&mut self, job_id: JobId) {
        self.job = None;
        self.awaiting_seed = Some(job_id);
    }

    pub(crate) fn discard_finished(&mut self) {
        if self.job.as_ref().is_some_and(|job| job.status.is_terminal()) {
            self.job = None;
        }
    }

    pub(crate) fn retire(&mut self) -> Option<JobId> {
        let job = self.job.take()?;
        self.retired = Some(job.job_id);
        Some(job.job_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedState {
    connection: ConnectionStatus,
    /// Latest connection epoch seen as connected.
    connection_epoch: u64,
    check: JobSlot,
    dependency_scan: JobSlot,
    dirty: bool,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> FeedViewModel {
        FeedViewModel {
            connection: self.connection,
            check: self.check.job().map(JobProgressView::from_job),
            dependency_scan: self.dependency_scan.job().map(JobProgressView::from_job),
            check_awaiting_seed: self.check.awaiting_seed().is_some(),
            scan_awaiting_seed: self.dependency_scan.awaiting_seed().is_some(),
        }
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn slot(&self, kind: JobKind) -> &JobSlot {
        match kind {
            JobKind::Check => &self.check,
            JobKind::DependencyScan => &self.dependency_scan,
        }
    }

    pub fn job(&self, kind: JobKind) -> Option<&JobState> {
        self.slot(kind).job()
    }

    /// Returns whether the view changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn slot_mut(&mut self, kind: JobKind) -> &mut JobSlot {
        match kind {
            JobKind::Check => &mut self.check,
            JobKind::DependencyScan => &mut self.dependency_scan,
        }
    }

    /// Records a connection change. Returns `true` for a connection that
    /// replaced an earlier one, even when the status itself did not change.
    pub(crate) fn set_connection(&mut self, status: ConnectionStatus, epoch: u64) -> bool {
        if self.connection != status {
            self.connection = status;
            self.mark_dirty();
        }
        if status != ConnectionStatus::Connected || epoch <= self.connection_epoch {
            return false;
        }
        self.connection_epoch = epoch;
        epoch > 1
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
