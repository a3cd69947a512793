use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::transport::{MessageStream, Transport};
use crate::TransportError;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry_ms: Option<u64>,
}

/// Incremental `text/event-stream` parser. Bytes can arrive split anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw body bytes and returns every frame completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // Comment, used by servers as keepalive.
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            "retry" => self.retry_ms = value.trim().parse().ok(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let retry_ms = self.retry_ms.take();
        let data = std::mem::take(&mut self.data).join("\n");
        if data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data,
            id: self.last_id.clone(),
            retry_ms,
        })
    }
}

/// HTTP streaming transport for the push endpoint.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// No request timeout is set: the stream is expected to stay open.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map(|client| Self { client })
            .map_err(|err| TransportError::Network(err.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn open(&self, endpoint: &str) -> Result<MessageStream, TransportError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|err| TransportError::InvalidEndpoint(err.to_string()))?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(event_data(response.bytes_stream().boxed()))
    }
}

struct BodyReader {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

/// Turns a response body into a stream of event `data` payloads.
fn event_data(body: BoxStream<'static, reqwest::Result<Bytes>>) -> MessageStream {
    let reader = BodyReader {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(data) = reader.ready.pop_front() {
                return Some((Ok(data), reader));
            }
            if reader.finished {
                return None;
            }
            match reader.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = reader.decoder.feed(&chunk);
                    reader.ready.extend(frames.into_iter().map(|frame| frame.data));
                }
                Some(Err(err)) => {
                    reader.finished = true;
                    return Some((Err(TransportError::Network(err.to_string())), reader));
                }
                None => {
                    reader.finished = true;
                    return Some((Err(TransportError::Closed), reader));
                }
            }
        }
    })
    .boxed()
}
