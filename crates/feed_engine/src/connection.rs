use std::sync::Arc;
use std::time::Duration;

use feed_logging::{feed_debug, feed_info, feed_trace, feed_warn};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{MessageStream, Transport};
use crate::{is_heartbeat, Backoff, ConnectionStatus, TransportError};

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    /// Fraction of each reconnect delay added as random jitter. `0.0` disables it.
    pub jitter_ratio: f64,
    /// Treat a silent connection as failed after this long. `None` relies on the
    /// transport's own error signal.
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            backoff_floor: Backoff::DEFAULT_FLOOR,
            backoff_ceiling: Backoff::DEFAULT_CEILING,
            jitter_ratio: 0.0,
            heartbeat_timeout: None,
        }
    }
}

/// Published connection state. `epoch` counts successful opens, so a
/// replaced connection is visible even when the status reads the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub epoch: u64,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Reconnecting,
            epoch: 0,
        }
    }
}

/// Owns the push connection lifecycle: open, detect failure, reconnect.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    settings: StreamSettings,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, settings: StreamSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Starts the connection loop on the current tokio runtime.
    pub fn open(&self, endpoint: impl Into<String>) -> StreamHandle {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionState::default());
        let reconnect = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let worker = StreamWorker {
            transport: self.transport.clone(),
            endpoint: endpoint.into(),
            backoff: Backoff::new(self.settings.backoff_floor, self.settings.backoff_ceiling)
                .with_jitter(self.settings.jitter_ratio),
            heartbeat_timeout: self.settings.heartbeat_timeout,
            message_tx,
            status_tx,
            reconnect: reconnect.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        StreamHandle {
            message_rx,
            status_rx,
            reconnect,
            cancel,
            task: Some(task),
        }
    }
}

/// Owned handle to an open push connection.
///
/// Dropping the handle closes the connection, so it can be tied to the scope
/// that consumes it.
pub struct StreamHandle {
    message_rx: mpsc::UnboundedReceiver<String>,
    status_rx: watch::Receiver<ConnectionState>,
    reconnect: Arc<Notify>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn status(&self) -> ConnectionStatus {
        if self.is_closed() {
            ConnectionStatus::Disconnected
        } else {
            self.status_rx.borrow().status
        }
    }

    /// Status plus connection epoch. Every successful open notifies receivers.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status_rx.clone()
    }

    /// Next business message, heartbeats excluded. `None` once closed.
    pub async fn next_message(&mut self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        self.message_rx.recv().await
    }

    pub fn try_next_message(&mut self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        self.message_rx.try_recv().ok()
    }

    /// Runs the open sequence now, without waiting for or touching the backoff.
    pub fn reconnect(&self) {
        if !self.is_closed() {
            self.reconnect.notify_one();
        }
    }

    /// Stops the connection loop and discards undelivered messages.
    /// Nothing is delivered through this handle afterwards. Idempotent.
    pub fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.cancel.cancel();
        task.abort();
        self.message_rx.close();
        while self.message_rx.try_recv().is_ok() {}
        feed_debug!("stream handle closed");
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

enum Disconnect {
    Failed(TransportError),
    Reconnect,
    Shutdown,
}

struct StreamWorker {
    transport: Arc<dyn Transport>,
    endpoint: String,
    backoff: Backoff,
    heartbeat_timeout: Option<Duration>,
    message_tx: mpsc::UnboundedSender<String>,
    status_tx: watch::Sender<ConnectionState>,
    reconnect: Arc<Notify>,
    cancel: CancellationToken,
}

impl StreamWorker {
    async fn run(mut self) {
        loop {
            self.set_status(ConnectionStatus::Reconnecting);
            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = self.reconnect.notified() => {
                    feed_debug!("manual reconnect while opening {}", self.endpoint);
                    continue;
                }
                opened = self.transport.open(&self.endpoint) => opened,
            };

            let failure = match opened {
                Ok(stream) => {
                    self.status_tx.send_modify(|current| {
                        current.status = ConnectionStatus::Connected;
                        current.epoch += 1;
                    });
                    self.backoff.reset();
                    feed_info!("stream connected to {}", self.endpoint);
                    match self.pump(stream).await {
                        Disconnect::Shutdown => return,
                        Disconnect::Reconnect => {
                            feed_debug!("manual reconnect of {}", self.endpoint);
                            continue;
                        }
                        Disconnect::Failed(err) => err,
                    }
                }
                Err(err) => err,
            };

            self.set_status(ConnectionStatus::Disconnected);
            let delay = self.backoff.next_delay();
            match &failure {
                TransportError::InvalidEndpoint(_) => {
                    feed_warn!("stream error: {}; retrying in {:?}", failure, delay)
                }
                _ => feed_debug!("stream error: {}; retrying in {:?}", failure, delay),
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = self.reconnect.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Forwards messages until the connection ends. The stream is dropped on return.
    async fn pump(&mut self, mut stream: MessageStream) -> Disconnect {
        let heartbeat_timeout = self.heartbeat_timeout;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Disconnect::Shutdown,
                _ = self.reconnect.notified() => return Disconnect::Reconnect,
                next = next_within(&mut stream, heartbeat_timeout) => next,
            };

            match next {
                Ok(Some(Ok(message))) => {
                    if is_heartbeat(&message) {
                        feed_trace!("heartbeat from {}", self.endpoint);
                        continue;
                    }
                    if self.message_tx.send(message).is_err() {
                        return Disconnect::Shutdown;
                    }
                }
                Ok(Some(Err(err))) => return Disconnect::Failed(err),
                Ok(None) => return Disconnect::Failed(TransportError::Closed),
                Err(stalled) => return Disconnect::Failed(stalled),
            }
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if current.status == status {
                false
            } else {
                current.status = status;
                true
            }
        });
    }
}

async fn next_within(
    stream: &mut MessageStream,
    timeout: Option<Duration>,
) -> Result<Option<Result<String, TransportError>>, TransportError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| TransportError::Stalled {
                timeout_ms: limit.as_millis(),
            }),
        None => Ok(stream.next().await),
    }
}
