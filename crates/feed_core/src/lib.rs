//! Feed core: pure job reconciler state machine and view-model helpers.
mod effect;
mod job;
mod msg;
mod notification;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use job::{JobEventKind, JobId, JobKind, JobSnapshot, JobState, JobStatus};
pub use msg::Msg;
pub use notification::{Notification, NotifyLevel};
pub use state::{ConnectionStatus, FeedState, JobSlot};
pub use update::update;
pub use view_model::{FeedViewModel, JobProgressView};
