use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::{ClientError, Result};

/// Conversation pages are always requested in chunks of this many messages.
pub const PAGE_SIZE: usize = 50;

/// Runtime knobs for the client. `Default` matches the web client's timings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST origin, e.g. `https://matcha.example.com`.
    pub base_url: Url,
    /// Raw `Cookie` header carrying an existing login session.
    pub session_cookie: Option<String>,
    /// Conversation reconciliation period while a conversation is open.
    pub poll_interval: Duration,
    /// Fallback period for unread counter refreshes.
    pub counter_interval: Duration,
    pub reconnect: ReconnectPolicy,
    /// How long a toast stays up when nothing replaces it.
    pub toast_lifetime: Duration,
    /// Online users idle for longer than this are shown as away.
    pub presence_threshold: Duration,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: Url::parse("http://localhost:8080").expect("static URL is valid"),
            session_cookie: None,
            poll_interval: Duration::from_secs(3),
            counter_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            toast_lifetime: Duration::from_secs(4),
            presence_threshold: Duration::from_secs(5 * 60),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Build from `MATCHA_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = match get("MATCHA_BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => defaults.base_url,
        };

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            Ok(get(key).map(|v| parse_number::<u64>(key, &v)).transpose()?.map_or(default, Duration::from_millis))
        };
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            Ok(get(key).map(|v| parse_number::<u64>(key, &v)).transpose()?.map_or(default, Duration::from_secs))
        };

        let reconnect = ReconnectPolicy {
            base: millis("MATCHA_RECONNECT_BASE_MS", defaults.reconnect.base)?,
            cap: millis("MATCHA_RECONNECT_CAP_MS", defaults.reconnect.cap)?,
            max_attempts: get("MATCHA_RECONNECT_MAX")
                .map(|v| parse_number::<u32>("MATCHA_RECONNECT_MAX", &v))
                .transpose()?
                .unwrap_or(defaults.reconnect.max_attempts),
        };
        if reconnect.base > reconnect.cap {
            return Err(ClientError::Config(
                "MATCHA_RECONNECT_BASE_MS must not exceed MATCHA_RECONNECT_CAP_MS".to_string(),
            ));
        }

        let config = ClientConfig {
            base_url,
            session_cookie: get("MATCHA_SESSION_COOKIE"),
            poll_interval: millis("MATCHA_POLL_INTERVAL_MS", defaults.poll_interval)?,
            counter_interval: millis("MATCHA_COUNTER_INTERVAL_MS", defaults.counter_interval)?,
            reconnect,
            toast_lifetime: millis("MATCHA_TOAST_MS", defaults.toast_lifetime)?,
            presence_threshold: secs("MATCHA_PRESENCE_THRESHOLD_SECS", defaults.presence_threshold)?,
            http_timeout: secs("MATCHA_HTTP_TIMEOUT_SECS", defaults.http_timeout)?,
        };

        if config.poll_interval.is_zero() || config.counter_interval.is_zero() {
            return Err(ClientError::Config("polling intervals must be non-zero".to_string()));
        }

        Ok(config)
    }

    /// Realtime endpoint: same host as the REST origin, `ws`/`wss` to match
    /// `http`/`https`, path `/ws`.
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.base_url.join("/ws")?;
        let scheme = match self.base_url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("cannot derive a {} URL from {}", scheme, self.base_url)))?;
        Ok(url)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "MATCHA_BASE_URL must use http:// or https://, got {}://",
            other
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| ClientError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}
