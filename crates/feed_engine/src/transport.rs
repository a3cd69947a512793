use futures_util::stream::BoxStream;

use crate::TransportError;

/// Messages of one open connection. An `Err` item or the end of the stream
/// means the connection is gone.
pub type MessageStream = BoxStream<'static, Result<String, TransportError>>;

/// Seam between the connection manager and the network.
///
/// A resolved `open` is the open signal, every stream item is a message, and
/// dropping the stream closes the connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<MessageStream, TransportError>;
}
