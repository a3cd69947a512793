use std::sync::Arc;

use feed_core::{update, ConnectionStatus, FeedState, FeedViewModel, JobId, JobKind, Msg};
use feed_engine::{
    ConnectionManager, ConnectionState, JobsApi, SseTransport, StreamHandle, Transport,
};
use feed_logging::{feed_debug, feed_info};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::effects::EffectRunner;
use crate::mapping::{connection_status, engine_kind};
use crate::{Collaborators, EventDispatcher, EventHandlers, FeedConfig, FeedError, Gate};

pub(crate) enum Command {
    Apply(Msg),
    Reconnect,
    ActiveJob {
        kind: JobKind,
        reply: oneshot::Sender<Option<JobId>>,
    },
}

/// A running live feed: one push connection, one reconciler, one view.
///
/// The reconciler state is owned by a single session task; this handle and the
/// effect runner talk to it through a command channel. Dropping the handle
/// closes the feed.
pub struct LiveFeed {
    api: Arc<dyn JobsApi>,
    commands: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<FeedViewModel>,
    gate: Gate,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// Opens the push stream over HTTP and starts the session on the current
    /// tokio runtime.
    pub fn start(
        config: &FeedConfig,
        api: Arc<dyn JobsApi>,
        collaborators: Collaborators,
        handlers: EventHandlers,
    ) -> Result<Self, FeedError> {
        let transport = SseTransport::new(config.connect_timeout())?;
        Self::start_with_transport(config, Arc::new(transport), api, collaborators, handlers)
    }

    pub fn start_with_transport(
        config: &FeedConfig,
        transport: Arc<dyn Transport>,
        api: Arc<dyn JobsApi>,
        collaborators: Collaborators,
        handlers: EventHandlers,
    ) -> Result<Self, FeedError> {
        let endpoint = config.stream_endpoint()?;
        let gate = Gate::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = FeedState::new();
        let (view_tx, view_rx) = watch::channel(state.view());

        let stream =
            ConnectionManager::new(transport, config.stream_settings()).open(endpoint.as_str());
        let status = stream.watch_status();
        feed_info!("live feed started on {}", endpoint);

        let session = Session {
            state,
            dispatcher: EventDispatcher::new(
                handlers,
                collaborators.notifier.clone(),
                config.default_notifications,
                gate.clone(),
            ),
            effects: EffectRunner::new(api.clone(), collaborators, command_tx.clone(), gate.clone()),
            stream,
            status,
            commands: command_rx,
            view_tx,
            gate: gate.clone(),
        };
        let task = tokio::spawn(session.run());

        Ok(Self {
            api,
            commands: command_tx,
            view_rx,
            gate,
            task: Some(task),
        })
    }

    /// Starts a job through REST. Failures are returned, not retried.
    pub async fn start_job(&self, kind: JobKind) -> Result<JobId, FeedError> {
        self.ensure_open()?;
        let response = self.api.start_job(engine_kind(kind)).await?;
        feed_info!(
            "{} job {} started (already_running={})",
            kind.label(),
            response.job_id,
            response.already_running
        );
        self.apply(Msg::JobStartResponded {
            kind,
            job_id: response.job_id,
            already_running: response.already_running,
        });
        Ok(response.job_id)
    }

    /// Asks the server to cancel the tracked job. The job stays visible as
    /// canceling until the outcome is pushed.
    pub async fn cancel_job(&self, kind: JobKind) -> Result<(), FeedError> {
        self.ensure_open()?;
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::ActiveJob { kind, reply })
            .map_err(|_| FeedError::Closed)?;
        let job_id = answer
            .await
            .map_err(|_| FeedError::Closed)?
            .ok_or(FeedError::NoActiveJob(kind))?;

        self.api.cancel_job(engine_kind(kind), job_id).await?;
        self.apply(Msg::CancelAcknowledged { kind, job_id });
        Ok(())
    }

    /// Clears a finished job from the view.
    pub fn dismiss(&self, kind: JobKind) {
        self.apply(Msg::Dismissed { kind });
    }

    pub fn reconnect(&self) {
        if !self.is_closed() {
            let _ = self.commands.send(Command::Reconnect);
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        if self.is_closed() {
            ConnectionStatus::Disconnected
        } else {
            self.view_rx.borrow().connection
        }
    }

    pub fn view(&self) -> FeedViewModel {
        self.view_rx.borrow().clone()
    }

    /// Every published view, for as many observers as needed.
    pub fn subscribe(&self) -> watch::Receiver<FeedViewModel> {
        self.view_rx.clone()
    }

    /// Stops the session and the stream. No callback, notification or refresh
    /// runs after this returns; a dispatch already in progress is waited for.
    /// Idempotent. Must not be called from inside an event callback.
    pub fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.gate.close();
        task.abort();
        feed_info!("live feed closed");
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    fn apply(&self, msg: Msg) {
        if !self.gate.is_closed() {
            let _ = self.commands.send(Command::Apply(msg));
        }
    }

    fn ensure_open(&self) -> Result<(), FeedError> {
        if self.is_closed() {
            Err(FeedError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.close();
    }
}

struct Session {
    state: FeedState,
    dispatcher: EventDispatcher,
    effects: EffectRunner,
    stream: StreamHandle,
    status: watch::Receiver<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    view_tx: watch::Sender<FeedViewModel>,
    gate: Gate,
}

impl Session {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.gate.closed() => break,
                Some(command) = self.commands.recv() => self.command(command),
                changed = self.status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *self.status.borrow_and_update();
                    self.apply(Msg::ConnectionChanged {
                        status: connection_status(current.status),
                        epoch: current.epoch,
                    });
                }
                message = self.stream.next_message() => match message {
                    Some(raw) => {
                        if let Some(msg) = self.dispatcher.handle(&raw) {
                            self.apply(msg);
                        }
                    }
                    None => break,
                },
            }
        }
        self.stream.close();
        feed_debug!("feed session stopped");
    }

    fn command(&mut self, command: Command) {
        match command {
            Command::Apply(msg) => self.apply(msg),
            Command::Reconnect => {
                feed_info!("manual reconnect requested");
                self.stream.reconnect();
            }
            Command::ActiveJob { kind, reply } => {
                let slot = self.state.slot(kind);
                let active = slot.tracked_id().filter(|_| slot.has_active_job());
                let _ = reply.send(active);
            }
        }
    }

    fn apply(&mut self, msg: Msg) {
        let (state, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = state;
        if self.state.consume_dirty() {
            self.view_tx.send_replace(self.state.view());
        }
        self.effects.run(effects);
    }
}
