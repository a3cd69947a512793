use std::sync::Arc;

use feed_core::{JobKind, Notification, NotifyLevel};
use feed_logging::{feed_error, feed_info, feed_warn};

/// Toast surface.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Reloads the REST-backed container and update lists after a job finishes.
/// Called fire and forget; failures are the implementor's concern.
pub trait ListRefresher: Send + Sync {
    fn refresh(&self, kind: JobKind);
}

/// The outside world a feed talks to besides the backend.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub refresher: Arc<dyn ListRefresher>,
}

impl Collaborators {
    pub fn new(notifier: Arc<dyn Notifier>, refresher: Arc<dyn ListRefresher>) -> Self {
        Self {
            notifier,
            refresher,
        }
    }
}

/// Writes notifications to the log. Useful for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.as_deref().unwrap_or("");
        match notification.level {
            NotifyLevel::Error => feed_error!("{}: {}", notification.title, message),
            NotifyLevel::Warning => feed_warn!("{}: {}", notification.title, message),
            NotifyLevel::Info | NotifyLevel::Success => {
                feed_info!("{}: {}", notification.title, message)
            }
        }
    }
}
