use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feed_engine::{
    ConnectionManager, ConnectionState, ConnectionStatus, MessageStream, StreamSettings, Transport,
    TransportError,
};
use futures_util::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

enum Script {
    Refuse,
    /// Opens, yields the messages, then reports the connection lost.
    Deliver(Vec<&'static str>),
    /// Opens, yields the messages, then stays open.
    Hold(Vec<&'static str>),
}

#[derive(Default)]
struct FakeTransport {
    script: Mutex<VecDeque<Script>>,
    opened_at: Mutex<Vec<Instant>>,
}

impl FakeTransport {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opened_at: Mutex::new(Vec::new()),
        })
    }

    fn opens(&self) -> Vec<Instant> {
        self.opened_at.lock().unwrap().clone()
    }

    /// Gaps between consecutive open attempts, rounded to 100 ms.
    fn gaps_ms(&self) -> Vec<u128> {
        self.opens()
            .windows(2)
            .map(|pair| ((pair[1] - pair[0]).as_millis() + 50) / 100 * 100)
            .collect()
    }
}

fn messages(items: Vec<&'static str>) -> impl futures_util::Stream<Item = Result<String, TransportError>> {
    stream::iter(items.into_iter().map(|item| Ok(item.to_string())))
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn open(&self, _endpoint: &str) -> Result<MessageStream, TransportError> {
        self.opened_at.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or(Script::Hold(Vec::new())) {
            Script::Refuse => Err(TransportError::Network("connection refused".to_string())),
            Script::Deliver(items) => Ok(messages(items)
                .chain(stream::once(async { Err(TransportError::Closed) }))
                .boxed()),
            Script::Hold(items) => Ok(messages(items).chain(stream::pending()).boxed()),
        }
    }
}

fn manager(transport: Arc<FakeTransport>, settings: StreamSettings) -> ConnectionManager {
    feed_logging::initialize_for_tests();
    ConnectionManager::new(transport, settings)
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_back_off_exponentially_up_to_ceiling() {
    let transport = FakeTransport::new(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Hold(Vec::new()),
    ]);
    let handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");

    tokio::time::sleep(Duration::from_secs(200)).await;

    assert_eq!(
        transport.gaps_ms(),
        vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]
    );
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_delay() {
    let transport = FakeTransport::new(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Deliver(Vec::new()),
        Script::Refuse,
        Script::Hold(Vec::new()),
    ]);
    let _handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.gaps_ms(), vec![1_000, 2_000, 4_000, 1_000, 2_000]);
}

#[tokio::test(start_paused = true)]
async fn messages_are_delivered_in_order_without_heartbeats() {
    let transport = FakeTransport::new(vec![Script::Hold(vec![
        r#"{"type":"connected"}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"job-progress","job_id":1,"checked_count":1}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"job-progress","job_id":1,"checked_count":2}"#,
    ])]);
    let mut handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(handle.next_message().await.unwrap());
    }
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        received,
        vec![
            r#"{"type":"connected"}"#.to_string(),
            r#"{"type":"job-progress","job_id":1,"checked_count":1}"#.to_string(),
            r#"{"type":"job-progress","job_id":1,"checked_count":2}"#.to_string(),
        ]
    );
    assert_eq!(handle.try_next_message(), None);
    assert_eq!(transport.opens().len(), 1);
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn status_follows_the_connection() {
    let transport = FakeTransport::new(vec![Script::Refuse, Script::Refuse]);
    let handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    assert_eq!(handle.status(), ConnectionStatus::Reconnecting);

    // First refusal, waiting one second before the next attempt.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);

    // Second refusal at 1s, then the held connection at 3s.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.status(), ConnectionStatus::Connected);
    assert_eq!(transport.opens().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn close_right_after_open_delivers_nothing() {
    let transport = FakeTransport::new(vec![Script::Hold(vec![
        r#"{"type":"update-detected","container_name":"web"}"#,
    ])]);
    let mut handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    let mut status = handle.watch_status();
    status.borrow_and_update();

    handle.close();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(handle.next_message().await, None);
    assert_eq!(handle.try_next_message(), None);
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    assert!(transport.opens().len() <= 1);
    assert!(!status.has_changed().unwrap_or(false));
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_reconnect_timer() {
    let transport = FakeTransport::new(vec![Script::Refuse, Script::Refuse, Script::Refuse]);
    let mut handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");

    // Two refusals: at 0s and 1s; the next attempt is due at 3s.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(transport.opens().len(), 2);

    handle.close();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.opens().len(), 2);
    assert_eq!(handle.next_message().await, None);
}

#[tokio::test(start_paused = true)]
async fn close_discards_undelivered_messages() {
    let transport = FakeTransport::new(vec![Script::Hold(vec![
        r#"{"type":"job-created","job_id":1}"#,
        r#"{"type":"job-started","job_id":1}"#,
    ])]);
    let mut handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    tokio::time::sleep(Duration::from_secs(1)).await;

    handle.close();
    handle.close();

    assert_eq!(handle.try_next_message(), None);
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_skips_the_backoff_wait() {
    let transport = FakeTransport::new(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
    ]);
    let handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    let started = Instant::now();

    // Refusals at 0, 1, 3, 7 and 15s; the sixth attempt would wait until 31s.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(transport.opens().len(), 5);

    handle.reconnect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let opens = transport.opens();
    assert_eq!(opens.len(), 6);
    assert_eq!((opens[5] - started).as_secs(), 20);
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_reopens_a_live_connection() {
    let transport = FakeTransport::new(vec![Script::Hold(Vec::new()), Script::Hold(Vec::new())]);
    let handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    tokio::time::sleep(Duration::from_secs(1)).await;

    handle.reconnect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(transport.opens().len(), 2);
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn each_successful_open_advances_the_epoch() {
    let transport = FakeTransport::new(vec![Script::Hold(Vec::new()), Script::Hold(Vec::new())]);
    let handle = manager(transport.clone(), StreamSettings::default()).open("http://feed.test/events");
    let mut state = handle.watch_status();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        *state.borrow_and_update(),
        ConnectionState {
            status: ConnectionStatus::Connected,
            epoch: 1
        }
    );

    // Read only after the new connection is up, so the intermediate
    // reconnecting status is never observed.
    handle.reconnect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(state.has_changed().unwrap_or(false));
    assert_eq!(
        *state.borrow_and_update(),
        ConnectionState {
            status: ConnectionStatus::Connected,
            epoch: 2
        }
    );
}

#[tokio::test(start_paused = true)]
async fn silent_connection_is_dropped_by_watchdog() {
    let transport = FakeTransport::new(vec![Script::Hold(Vec::new()), Script::Hold(Vec::new())]);
    let settings = StreamSettings {
        heartbeat_timeout: Some(Duration::from_secs(5)),
        ..StreamSettings::default()
    };
    let _handle = manager(transport.clone(), settings).open("http://feed.test/events");

    tokio::time::sleep(Duration::from_millis(6_500)).await;

    assert_eq!(transport.gaps_ms(), vec![6_000]);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_the_watchdog_quiet() {
    let transport = Arc::new(HeartbeatTransport::default());
    let settings = StreamSettings {
        heartbeat_timeout: Some(Duration::from_secs(5)),
        ..StreamSettings::default()
    };
    feed_logging::initialize_for_tests();
    let mut handle = ConnectionManager::new(transport.clone(), settings).open("http://feed.test/events");

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(*transport.opens.lock().unwrap(), 1);
    assert_eq!(handle.try_next_message(), None);
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}

/// Sends a ping every two seconds, forever.
#[derive(Default)]
struct HeartbeatTransport {
    opens: Mutex<usize>,
}

#[async_trait::async_trait]
impl Transport for HeartbeatTransport {
    async fn open(&self, _endpoint: &str) -> Result<MessageStream, TransportError> {
        *self.opens.lock().unwrap() += 1;
        let pings = stream::unfold((), |()| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Some((Ok::<_, TransportError>(r#"{"type":"ping"}"#.to_string()), ()))
        });
        Ok(pings.boxed())
    }
}
