use std::sync::Arc;

use feed_core::{Effect, JobId, JobKind, Msg};
use feed_engine::JobsApi;
use feed_logging::{feed_debug, feed_info, feed_warn};
use tokio::sync::mpsc;

use crate::feed::Command;
use crate::mapping::{engine_kind, job_snapshot};
use crate::{Collaborators, Gate};

/// Executes reducer effects. Does nothing once the gate is closed.
pub(crate) struct EffectRunner {
    api: Arc<dyn JobsApi>,
    collaborators: Collaborators,
    commands: mpsc::UnboundedSender<Command>,
    gate: Gate,
}

impl EffectRunner {
    pub(crate) fn new(
        api: Arc<dyn JobsApi>,
        collaborators: Collaborators,
        commands: mpsc::UnboundedSender<Command>,
        gate: Gate,
    ) -> Self {
        Self {
            api,
            collaborators,
            commands,
            gate,
        }
    }

    pub(crate) fn run(&self, effects: Vec<Effect>) {
        let Some(_section) = self.gate.enter() else {
            return;
        };
        for effect in effects {
            if self.gate.is_closed() {
                return;
            }
            match effect {
                Effect::FetchJobStatus { kind, job_id } => self.fetch_job_status(kind, job_id),
                Effect::RefreshLists { kind } => {
                    feed_info!("{} finished; refreshing lists", kind.label());
                    self.collaborators.refresher.refresh(kind);
                }
                Effect::Notify(notification) => self.collaborators.notifier.notify(notification),
            }
        }
    }

    fn fetch_job_status(&self, kind: JobKind, job_id: JobId) {
        feed_debug!("FetchJobStatus kind={:?} job_id={}", kind, job_id);
        let api = self.api.clone();
        let commands = self.commands.clone();
        let gate = self.gate.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = gate.closed() => return,
                result = api.job_status(engine_kind(kind), job_id) => result,
            };
            let msg = match result {
                Ok(payload) => Msg::JobStatusFetched {
                    kind,
                    snapshot: job_snapshot(payload.job_id.unwrap_or(job_id), &payload),
                },
                Err(err) => {
                    feed_warn!("status of job {} unavailable: {}", job_id, err);
                    Msg::JobStatusFetchFailed {
                        kind,
                        job_id,
                        reason: err.to_string(),
                    }
                }
            };
            if !gate.is_closed() {
                let _ = commands.send(Command::Apply(msg));
            }
        });
    }
}
