//! Feed client: runs the push stream, the job reconciler and the REST job
//! calls as one session behind [`LiveFeed`].
mod collaborators;
mod config;
mod dispatcher;
mod effects;
mod error;
mod feed;
mod gate;
pub mod logging;
mod mapping;

pub use collaborators::{Collaborators, ListRefresher, LogNotifier, Notifier};
pub use config::FeedConfig;
pub use dispatcher::{default_notification, EventDispatcher, EventHandlers};
pub use error::FeedError;
pub use feed::LiveFeed;
pub use gate::Gate;
pub use feed_core::{
    ConnectionStatus, FeedViewModel, JobId, JobKind, JobProgressView, JobStatus, Notification,
    NotifyLevel,
};
pub use feed_engine::EventKind;
