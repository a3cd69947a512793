//! Conversions between engine wire types and reconciler types.

use feed_core::{ConnectionStatus, JobEventKind, JobId, JobKind, JobSnapshot, JobStatus};
use feed_engine::{EventKind, JobPayload, JobPhase};

pub(crate) fn core_kind(kind: feed_engine::JobKind) -> JobKind {
    match kind {
        feed_engine::JobKind::Check => JobKind::Check,
        feed_engine::JobKind::DependencyScan => JobKind::DependencyScan,
    }
}

pub(crate) fn engine_kind(kind: JobKind) -> feed_engine::JobKind {
    match kind {
        JobKind::Check => feed_engine::JobKind::Check,
        JobKind::DependencyScan => feed_engine::JobKind::DependencyScan,
    }
}

pub(crate) fn connection_status(status: feed_engine::ConnectionStatus) -> ConnectionStatus {
    match status {
        feed_engine::ConnectionStatus::Connected => ConnectionStatus::Connected,
        feed_engine::ConnectionStatus::Disconnected => ConnectionStatus::Disconnected,
        feed_engine::ConnectionStatus::Reconnecting => ConnectionStatus::Reconnecting,
    }
}

pub(crate) fn job_event(kind: EventKind) -> Option<JobEventKind> {
    match kind {
        EventKind::JobCreated => Some(JobEventKind::Created),
        EventKind::JobStarted => Some(JobEventKind::Started),
        EventKind::JobProgress => Some(JobEventKind::Progress),
        EventKind::JobCompleted => Some(JobEventKind::Completed),
        EventKind::JobFailed => Some(JobEventKind::Failed),
        EventKind::JobCanceled => Some(JobEventKind::Canceled),
        _ => None,
    }
}

fn job_status(phase: JobPhase) -> Option<JobStatus> {
    match phase {
        JobPhase::Queued => Some(JobStatus::Queued),
        JobPhase::Running => Some(JobStatus::Running),
        JobPhase::Done => Some(JobStatus::Done),
        JobPhase::Failed => Some(JobStatus::Failed),
        JobPhase::Canceled => Some(JobStatus::Canceled),
        JobPhase::Unknown => None,
    }
}

pub(crate) fn job_snapshot(job_id: JobId, payload: &JobPayload) -> JobSnapshot {
    JobSnapshot {
        job_id,
        status: payload.status.and_then(job_status),
        total_count: payload.total_count,
        processed_count: payload.checked_count,
        items_found_count: payload.updates_found,
        errors_count: payload.errors_count,
        current_item: payload.current_container.clone(),
        progress_percent: payload.progress_percent,
        error: payload.error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_phase_leaves_status_open() {
        let payload = JobPayload {
            job_id: Some(3),
            status: Some(JobPhase::Unknown),
            checked_count: Some(2),
            ..JobPayload::default()
        };
        let snapshot = job_snapshot(3, &payload);
        assert_eq!(snapshot.status, None);
        assert_eq!(snapshot.processed_count, Some(2));
    }

    #[test]
    fn kinds_map_both_ways() {
        for kind in JobKind::ALL {
            assert_eq!(core_kind(engine_kind(kind)), kind);
        }
    }
}
