use feed_core::JobKind;
use feed_engine::{ApiError, TransportError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no {} is running", .0.label().to_lowercase())]
    NoActiveJob(JobKind),
    #[error("feed is closed")]
    Closed,
}
