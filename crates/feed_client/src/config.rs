use std::time::Duration;

use feed_engine::{ApiSettings, StreamSettings};
use feed_logging::feed_warn;
use serde::Deserialize;
use url::Url;

use crate::FeedError;

const ENV_BASE_URL: &str = "FEED_BASE_URL";
const ENV_DEFAULT_NOTIFICATIONS: &str = "FEED_DEFAULT_NOTIFICATIONS";
const ENV_HEARTBEAT_TIMEOUT_MS: &str = "FEED_HEARTBEAT_TIMEOUT_MS";
const ENV_BACKOFF_JITTER: &str = "FEED_BACKOFF_JITTER";

/// Settings for one [`LiveFeed`](crate::LiveFeed). Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Backend API root; the stream and job resources live below it.
    pub base_url: String,
    pub stream_path: String,
    /// Show the built-in toast for each business event.
    pub default_notifications: bool,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub jitter_ratio: f64,
    /// Drop a connection that stays silent this long. `None` or `0` disables it.
    pub heartbeat_timeout_ms: Option<u64>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            stream_path: "events/stream".to_string(),
            default_notifications: true,
            backoff_floor_ms: 1_000,
            backoff_ceiling_ms: 30_000,
            jitter_ratio: 0.0,
            heartbeat_timeout_ms: None,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl FeedConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, FeedError> {
        serde_json::from_str(raw).map_err(|err| FeedError::Config(err.to_string()))
    }

    /// Reads overrides from the process environment. `origin` is the base URL
    /// used when `FEED_BASE_URL` is not set.
    pub fn from_env(origin: &str) -> Self {
        Self::from_lookup(origin, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(origin: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(lookup(ENV_BASE_URL).unwrap_or_else(|| origin.to_string()));

        if let Some(raw) = lookup(ENV_DEFAULT_NOTIFICATIONS) {
            match parse_flag(&raw) {
                Some(flag) => config.default_notifications = flag,
                None => feed_warn!("ignoring {}={:?}", ENV_DEFAULT_NOTIFICATIONS, raw),
            }
        }
        if let Some(raw) = lookup(ENV_HEARTBEAT_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.heartbeat_timeout_ms = Some(ms),
                Err(_) => feed_warn!("ignoring {}={:?}", ENV_HEARTBEAT_TIMEOUT_MS, raw),
            }
        }
        if let Some(raw) = lookup(ENV_BACKOFF_JITTER) {
            match raw.trim().parse::<f64>() {
                Ok(ratio) if (0.0..=1.0).contains(&ratio) => config.jitter_ratio = ratio,
                _ => feed_warn!("ignoring {}={:?}", ENV_BACKOFF_JITTER, raw),
            }
        }
        config
    }

    pub fn stream_endpoint(&self) -> Result<Url, FeedError> {
        let base = format!("{}/", self.base_url.trim_end_matches('/'));
        let base =
            Url::parse(&base).map_err(|err| FeedError::Config(format!("{}: {err}", self.base_url)))?;
        base.join(self.stream_path.trim_start_matches('/'))
            .map_err(|err| FeedError::Config(format!("{}: {err}", self.stream_path)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            backoff_floor: Duration::from_millis(self.backoff_floor_ms),
            backoff_ceiling: Duration::from_millis(self.backoff_ceiling_ms),
            jitter_ratio: self.jitter_ratio,
            heartbeat_timeout: self
                .heartbeat_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: self.connect_timeout(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
