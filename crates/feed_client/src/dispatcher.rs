use std::collections::HashMap;
use std::sync::Arc;

use feed_core::{Msg, Notification, NotifyLevel};
use feed_engine::{EventKind, StreamEvent};
use feed_logging::{feed_debug, feed_trace, feed_warn};
use serde_json::Value;

use crate::mapping::{core_kind, job_event, job_snapshot};
use crate::{Gate, Notifier};

pub(crate) const UNPROCESSED_EVENT_TITLE: &str = "Could not process a server event";

type EventCallback = Box<dyn Fn(&Value) + Send + Sync>;

/// Caller callbacks keyed by business event kind.
#[derive(Default)]
pub struct EventHandlers {
    callbacks: HashMap<EventKind, Vec<EventCallback>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `kind`. Several callbacks per kind run in
    /// registration order.
    pub fn on(mut self, kind: EventKind, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.callbacks
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
        self
    }

    fn run(&self, kind: EventKind, payload: &Value, gate: &Gate) {
        for callback in self.callbacks.get(&kind).into_iter().flatten() {
            if gate.is_closed() {
                return;
            }
            callback(payload);
        }
    }
}

/// Routes raw stream messages to callbacks, toasts and the reconciler.
pub struct EventDispatcher {
    handlers: EventHandlers,
    notifier: Arc<dyn Notifier>,
    default_notifications: bool,
    gate: Gate,
}

impl EventDispatcher {
    /// Nothing is dispatched once `gate` is closed, and closing waits for a
    /// dispatch in progress.
    pub fn new(
        handlers: EventHandlers,
        notifier: Arc<dyn Notifier>,
        default_notifications: bool,
        gate: Gate,
    ) -> Self {
        Self {
            handlers,
            notifier,
            default_notifications,
            gate,
        }
    }

    /// Handles one raw message. Returns the reconciler input for job events.
    pub fn handle(&self, raw: &str) -> Option<Msg> {
        let _section = self.gate.enter()?;

        let event = match StreamEvent::decode(raw) {
            Ok(event) => event,
            Err(err) => {
                feed_warn!("dropping server event: {}", err);
                self.notifier.notify(
                    Notification::new(NotifyLevel::Warning, UNPROCESSED_EVENT_TITLE)
                        .with_message("Displayed data may be out of date. Refresh to reload it."),
                );
                return None;
            }
        };

        match &event {
            StreamEvent::Connected => {
                feed_debug!("stream acknowledged");
                None
            }
            StreamEvent::Heartbeat => None,
            StreamEvent::Unknown { kind, .. } => {
                feed_debug!("ignoring server event of unknown type {:?}", kind);
                None
            }
            StreamEvent::Business { kind, payload } => {
                self.handlers.run(*kind, payload, &self.gate);
                if self.gate.is_closed() {
                    return None;
                }
                if self.default_notifications {
                    if let Some(notification) = default_notification(*kind, payload) {
                        self.notifier.notify(notification);
                    }
                }
                self.job_msg(*kind, &event)
            }
        }
    }

    fn job_msg(&self, kind: EventKind, event: &StreamEvent) -> Option<Msg> {
        let job_event = job_event(kind)?;
        let payload = match event.job_payload()? {
            Ok(payload) => payload,
            Err(err) => {
                feed_warn!("dropping job event: {}", err);
                return None;
            }
        };
        let Some(job_id) = payload.job_id else {
            feed_trace!("{} without job_id", kind.as_str());
            return None;
        };
        Some(Msg::JobEvent {
            kind: core_kind(payload.kind()),
            event: job_event,
            snapshot: job_snapshot(job_id, &payload),
        })
    }
}

/// The built-in toast for a business event, if it has one.
pub fn default_notification(kind: EventKind, payload: &Value) -> Option<Notification> {
    let container = text(payload, "container_name").or_else(|| text(payload, "container"));
    let error = text(payload, "error");

    let notification = match kind {
        EventKind::UpdateDetected => {
            let message = match (container, text(payload, "latest_version")) {
                (Some(name), Some(version)) => Some(format!("{name}: {version} is available")),
                (name, _) => name.map(str::to_string),
            };
            with_optional(Notification::new(NotifyLevel::Info, "Update available"), message)
        }
        EventKind::UpdateApplied => with_optional(
            Notification::new(NotifyLevel::Success, "Update applied"),
            container.map(str::to_string),
        ),
        EventKind::UpdateApplyFailed => with_optional(
            Notification::new(NotifyLevel::Error, "Update failed"),
            joined(container, error),
        ),
        EventKind::ContainerRestarted => with_optional(
            Notification::new(NotifyLevel::Info, "Container restarted"),
            container.map(str::to_string),
        ),
        EventKind::HealthCheckFailed => with_optional(
            Notification::new(NotifyLevel::Warning, "Health check failed"),
            joined(container, error),
        ),
        EventKind::JobCompleted => {
            let found = payload
                .get("updates_found")
                .or_else(|| payload.get("items_found"))
                .and_then(Value::as_u64);
            let message = found.map(|count| match count {
                1 => "1 update found".to_string(),
                count => format!("{count} updates found"),
            });
            with_optional(
                Notification::new(NotifyLevel::Success, format!("{} complete", job_title(payload))),
                message,
            )
        }
        EventKind::JobFailed => with_optional(
            Notification::new(NotifyLevel::Error, format!("{} failed", job_title(payload))),
            error.map(str::to_string),
        ),
        EventKind::JobCanceled => {
            Notification::new(NotifyLevel::Info, format!("{} canceled", job_title(payload)))
        }
        EventKind::JobCreated | EventKind::JobStarted | EventKind::JobProgress => return None,
    };
    Some(notification)
}

fn text<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

fn joined(container: Option<&str>, error: Option<&str>) -> Option<String> {
    match (container, error) {
        (Some(name), Some(error)) => Some(format!("{name}: {error}")),
        (Some(value), None) | (None, Some(value)) => Some(value.to_string()),
        (None, None) => None,
    }
}

fn with_optional(notification: Notification, message: Option<String>) -> Notification {
    match message {
        Some(message) => notification.with_message(message),
        None => notification,
    }
}

fn job_title(payload: &Value) -> &'static str {
    match text(payload, "job_type") {
        Some("dependency_scan" | "dependency-scan") => "Dependency scan",
        _ => "Check",
    }
}
