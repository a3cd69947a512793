use crate::{
    Effect, FeedState, JobEventKind, JobId, JobKind, JobSnapshot, JobState, JobStatus, Msg,
    Notification, NotifyLevel,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: FeedState, msg: Msg) -> (FeedState, Vec<Effect>) {
    let effects = match msg {
        Msg::JobStartResponded {
            kind,
            job_id,
            already_running,
        } => start_responded(&mut state, kind, job_id, already_running),
        Msg::JobStatusFetched { kind, snapshot } => status_fetched(&mut state, kind, snapshot),
        Msg::JobStatusFetchFailed {
            kind,
            job_id,
            reason,
        } => {
            if state.slot(kind).tracked_id() == Some(job_id) {
                vec![Effect::Notify(
                    Notification::new(
                        NotifyLevel::Warning,
                        format!("Could not load {} status", kind.label().to_lowercase()),
                    )
                    .with_message(reason),
                )]
            } else {
                Vec::new()
            }
        }
        Msg::JobEvent {
            kind,
            event,
            snapshot,
        } => job_event(&mut state, kind, event, snapshot),
        Msg::CancelAcknowledged { kind, job_id } => {
            let marked = match state.slot_mut(kind).job_mut() {
                Some(job)
                    if job.job_id == job_id
                        && !job.status.is_terminal()
                        && !job.cancel_requested =>
                {
                    job.cancel_requested = true;
                    true
                }
                _ => false,
            };
            if marked {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::Dismissed { kind } => {
            let finished = state
                .job(kind)
                .is_some_and(|job| job.status.is_terminal());
            // Running jobs stay visible; only finished summaries can be acknowledged.
            if finished && state.slot_mut(kind).retire().is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ConnectionChanged { status, epoch } => {
            if state.set_connection(status, epoch) {
                resync_active_jobs(&state)
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}

fn start_responded(
    state: &mut FeedState,
    kind: JobKind,
    job_id: JobId,
    already_running: bool,
) -> Vec<Effect> {
    let slot = state.slot(kind);
    if slot.has_active_job() && slot.tracked_id() != Some(job_id) {
        // Never overwrite the identity of a job that is still in flight.
        return Vec::new();
    }
    let known = slot.job().is_some_and(|job| job.job_id == job_id);

    if already_running {
        if !known {
            state.slot_mut(kind).await_seed(job_id);
            state.mark_dirty();
        }
        return vec![Effect::FetchJobStatus { kind, job_id }];
    }

    // The push stream may already have created this job with richer state.
    if !known {
        state
            .slot_mut(kind)
            .install(JobState::seeded(kind, job_id, JobStatus::Queued));
        state.mark_dirty();
    }
    Vec::new()
}

fn status_fetched(state: &mut FeedState, kind: JobKind, snapshot: JobSnapshot) -> Vec<Effect> {
    if state.slot(kind).tracked_id() != Some(snapshot.job_id) {
        return Vec::new();
    }

    let mut changed = false;
    let slot = state.slot_mut(kind);
    if slot.job().is_none() {
        slot.install(JobState::from_snapshot(kind, &snapshot, JobStatus::Running));
        changed = true;
    }

    let mut effects = Vec::new();
    if let Some(job) = slot.job_mut() {
        match snapshot.status {
            Some(status) if status.is_terminal() => {
                if let Some(terminal) = finish(job, status, &snapshot) {
                    changed = true;
                    effects = terminal;
                }
            }
            status => {
                changed |= job.advance(status.unwrap_or(JobStatus::Queued), &snapshot);
            }
        }
    }

    if changed {
        state.mark_dirty();
    }
    effects
}

fn job_event(
    state: &mut FeedState,
    kind: JobKind,
    event: JobEventKind,
    snapshot: JobSnapshot,
) -> Vec<Effect> {
    let creates = matches!(event, JobEventKind::Created | JobEventKind::Started);
    let slot = state.slot_mut(kind);
    match slot.tracked_id() {
        Some(tracked) if tracked == snapshot.job_id => {}
        // A new job takes over from a finished one that was never dismissed.
        Some(_) if creates && !slot.has_active_job() && !slot.is_retired(snapshot.job_id) => {
            slot.discard_finished();
        }
        Some(_) => return Vec::new(),
        None if !creates || slot.is_retired(snapshot.job_id) => return Vec::new(),
        None => {}
    }

    let mut changed = false;
    if slot.job().is_none() {
        let fallback = if event == JobEventKind::Created {
            JobStatus::Queued
        } else {
            JobStatus::Running
        };
        slot.install(JobState::from_snapshot(kind, &snapshot, fallback));
        changed = true;
    }

    let mut effects = Vec::new();
    if let Some(job) = slot.job_mut() {
        let terminal = match event {
            JobEventKind::Created => {
                changed |= job.advance(JobStatus::Queued, &snapshot);
                None
            }
            JobEventKind::Started | JobEventKind::Progress => {
                changed |= job.advance(JobStatus::Running, &snapshot);
                None
            }
            JobEventKind::Completed => finish(job, JobStatus::Done, &snapshot),
            JobEventKind::Failed => finish(job, JobStatus::Failed, &snapshot),
            JobEventKind::Canceled => finish(job, JobStatus::Canceled, &snapshot),
        };
        if let Some(terminal) = terminal {
            changed = true;
            effects = terminal;
        }
    }

    if changed {
        state.mark_dirty();
    }
    effects
}

/// Applies a terminal transition. `None` when the job had already finished.
fn finish(job: &mut JobState, status: JobStatus, snapshot: &JobSnapshot) -> Option<Vec<Effect>> {
    if !job.finish(status, snapshot) {
        return None;
    }
    // The stream only reports progress; final results live behind REST.
    let effects = match status {
        JobStatus::Done | JobStatus::Canceled => vec![Effect::RefreshLists { kind: job.kind }],
        _ => Vec::new(),
    };
    Some(effects)
}

/// Events missed while disconnected are not replayed, so re-read in-flight jobs.
fn resync_active_jobs(state: &FeedState) -> Vec<Effect> {
    JobKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let slot = state.slot(kind);
            if !slot.has_active_job() {
                return None;
            }
            slot.tracked_id()
                .map(|job_id| Effect::FetchJobStatus { kind, job_id })
        })
        .collect()
}
