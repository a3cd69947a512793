use std::sync::Once;

use feed_core::{
    update, Effect, FeedState, JobEventKind, JobKind, JobSnapshot, JobStatus, Msg,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(feed_logging::initialize_for_tests);
}

fn push(state: FeedState, event: JobEventKind, snapshot: JobSnapshot) -> (FeedState, Vec<Effect>) {
    update(
        state,
        Msg::JobEvent {
            kind: JobKind::Check,
            event,
            snapshot,
        },
    )
}

fn started_check(job_id: u64) -> FeedState {
    let (state, effects) = update(
        FeedState::new(),
        Msg::JobStartResponded {
            kind: JobKind::Check,
            job_id,
            already_running: false,
        },
    );
    assert!(effects.is_empty());
    state
}

#[test]
fn fresh_start_seeds_a_queued_job() {
    init_logging();
    let mut state = started_check(1);

    let view = state.view();
    let job = view.check.expect("check job");
    assert_eq!(job.job_id, 1);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.processed, 0);
    assert_eq!(job.percent, 0);
    assert!(job.can_cancel);
    assert!(!job.can_dismiss);
    assert!(state.consume_dirty());
}

#[test]
fn check_runs_to_completion_and_refreshes_once() {
    init_logging();
    let state = started_check(1);

    let (state, effects) = push(
        state,
        JobEventKind::Started,
        JobSnapshot {
            status: Some(JobStatus::Running),
            total_count: Some(10),
            processed_count: Some(0),
            ..JobSnapshot::new(1)
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().check.unwrap().status, JobStatus::Running);

    let (state, effects) = push(
        state,
        JobEventKind::Progress,
        JobSnapshot {
            processed_count: Some(4),
            items_found_count: Some(1),
            progress_percent: Some(40.0),
            current_item: Some("nginx".to_string()),
            ..JobSnapshot::new(1)
        },
    );
    assert!(effects.is_empty());
    let job = state.view().check.unwrap();
    assert_eq!(job.progress_label(), "4/10");
    assert_eq!(job.percent, 40);
    assert_eq!(job.current_item.as_deref(), Some("nginx"));

    let (state, effects) = push(
        state,
        JobEventKind::Completed,
        JobSnapshot {
            processed_count: Some(10),
            items_found_count: Some(3),
            ..JobSnapshot::new(1)
        },
    );
    assert_eq!(
        effects,
        vec![Effect::RefreshLists {
            kind: JobKind::Check
        }]
    );

    let job = state.view().check.unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.processed, 10);
    assert_eq!(job.total, 10);
    assert_eq!(job.items_found, 3);
    assert_eq!(job.percent, 100);
    assert_eq!(job.current_item, None);
    assert!(job.can_dismiss);

    // A duplicated completion must not refresh a second time.
    let (_state, effects) = push(
        state,
        JobEventKind::Completed,
        JobSnapshot {
            processed_count: Some(10),
            items_found_count: Some(3),
            ..JobSnapshot::new(1)
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn cancel_waits_for_push_event_and_keeps_partial_counts() {
    init_logging();
    let state = started_check(1);
    let (state, _) = push(
        state,
        JobEventKind::Progress,
        JobSnapshot {
            processed_count: Some(5),
            total_count: Some(10),
            ..JobSnapshot::new(1)
        },
    );

    let (mut state, effects) = update(
        state,
        Msg::CancelAcknowledged {
            kind: JobKind::Check,
            job_id: 1,
        },
    );
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    let job = state.view().check.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.cancel_requested);
    assert!(!job.can_cancel);

    let (state, effects) = push(
        state,
        JobEventKind::Canceled,
        JobSnapshot {
            processed_count: Some(6),
            total_count: Some(10),
            ..JobSnapshot::new(1)
        },
    );
    assert_eq!(
        effects,
        vec![Effect::RefreshLists {
            kind: JobKind::Check
        }]
    );
    let job = state.view().check.unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert_eq!(job.processed, 6);
    assert_eq!(job.total, 10);
    assert!(!job.cancel_requested);
}

#[test]
fn failure_preserves_counters_without_refresh() {
    init_logging();
    let state = started_check(3);
    let (state, _) = push(
        state,
        JobEventKind::Progress,
        JobSnapshot {
            processed_count: Some(2),
            total_count: Some(8),
            errors_count: Some(1),
            ..JobSnapshot::new(3)
        },
    );

    let (state, effects) = push(
        state,
        JobEventKind::Failed,
        JobSnapshot {
            error: Some("registry unreachable".to_string()),
            ..JobSnapshot::new(3)
        },
    );
    assert!(effects.is_empty());
    let job = state.view().check.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress_label(), "2/8");
    assert_eq!(job.errors, 1);
    assert_eq!(job.error.as_deref(), Some("registry unreachable"));
}

#[test]
fn terminal_jobs_ignore_late_progress() {
    init_logging();
    let state = started_check(1);
    let (state, _) = push(state, JobEventKind::Completed, JobSnapshot::new(1));
    let before = state.clone();

    let (mut after, effects) = push(
        state,
        JobEventKind::Progress,
        JobSnapshot {
            processed_count: Some(99),
            ..JobSnapshot::new(1)
        },
    );
    assert!(effects.is_empty());
    assert_eq!(after.view().check, before.view().check);
    // The completion itself dirtied the state; the late event must not.
    assert!(after.consume_dirty());
    let (mut again, _) = push(after, JobEventKind::Progress, JobSnapshot::new(1));
    assert!(!again.consume_dirty());
}

#[test]
fn dependency_scan_is_tracked_independently() {
    init_logging();
    let state = started_check(1);
    let (state, _) = update(
        state,
        Msg::JobEvent {
            kind: JobKind::DependencyScan,
            event: JobEventKind::Started,
            snapshot: JobSnapshot {
                total_count: Some(4),
                ..JobSnapshot::new(20)
            },
        },
    );

    let view = state.view();
    assert_eq!(view.check.as_ref().unwrap().job_id, 1);
    let scan = view.dependency_scan.as_ref().unwrap();
    assert_eq!(scan.job_id, 20);
    assert_eq!(scan.kind, JobKind::DependencyScan);
    assert_eq!(scan.status, JobStatus::Running);
    assert!(view.is_busy(JobKind::DependencyScan));
}
