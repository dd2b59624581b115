//! Configuration
//!
//! Two layers, mirroring how the rest of the stack is configured:
//!
//! - [`RemotingConfig`]: per-connection settings carried as a URL
//!   (`exchange://10.0.0.7:20880/svc?heartbeat=9000&reconnect=false`).
//!   Immutable; updates produce a new value.
//! - [`TimerSettings`]: process-wide constants for the idle-check scheduler,
//!   loaded once at startup (TOML) and shared by every exchange client.

use crate::constants::*;
use crate::error::{RemotingError, Result};
use crate::timer::WheelConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotingConfig {
    /// Endpoint without its query string
    url: Url,
    parameters: BTreeMap<String, String>,
}

impl RemotingConfig {
    /// Parse a configuration URL
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| {
            RemotingError::configuration(format!("Invalid remoting URL '{}': {}", input, e), None)
        })?;
        Ok(Self::from_url(url))
    }

    /// Split an already parsed URL into endpoint and parameters
    pub fn from_url(mut url: Url) -> Self {
        let parameters = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);
        Self { url, parameters }
    }

    pub fn protocol(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// `host:port`, or just the host when no port is set
    pub fn address(&self) -> String {
        match (self.host(), self.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Raw parameter value; empty values count as absent
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Typed parameter, `default` when absent, error when unparsable
    pub fn parameter_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.parameter(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                RemotingError::configuration(
                    format!("Invalid value '{}' for parameter '{}'", raw, key),
                    Some(key),
                )
            }),
        }
    }

    /// Boolean parameter. Anything but a case-insensitive `true` is false.
    pub fn bool_parameter(&self, key: &str, default: bool) -> bool {
        match self.parameter(key) {
            None => default,
            Some(raw) => raw.eq_ignore_ascii_case("true"),
        }
    }

    /// Copy with one parameter set
    pub fn with_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_parameters([(key.into(), value.into())])
    }

    /// Copy with `parameters` merged over the current ones
    pub fn with_parameters<I, K, V>(&self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut merged = self.parameters.clone();
        for (k, v) in parameters {
            merged.insert(k.into(), v.into());
        }
        Self {
            url: self.url.clone(),
            parameters: merged,
        }
    }

    /// Heartbeat interval in milliseconds
    pub fn heartbeat(&self) -> Result<i64> {
        self.parameter_or(HEARTBEAT_KEY, DEFAULT_HEARTBEAT_MS)
    }

    /// Idle timeout in milliseconds.
    ///
    /// Defaults to three heartbeat intervals and must be at least two, or a
    /// single lost heartbeat reply would already look like a dead peer.
    pub fn idle_timeout(&self) -> Result<i64> {
        let heartbeat = self.heartbeat()?;
        let idle_timeout = self.parameter_or(
            HEARTBEAT_TIMEOUT_KEY,
            heartbeat.saturating_mul(DEFAULT_IDLE_TIMEOUT_FACTOR),
        )?;
        if idle_timeout < heartbeat.saturating_mul(MIN_IDLE_TIMEOUT_FACTOR) {
            return Err(RemotingError::configuration(
                format!(
                    "idle timeout {}ms is less than twice the heartbeat interval {}ms",
                    idle_timeout, heartbeat
                ),
                Some(HEARTBEAT_TIMEOUT_KEY),
            ));
        }
        Ok(idle_timeout)
    }

    /// Whether the reconnect task should be armed
    pub fn should_reconnect(&self) -> bool {
        self.bool_parameter(RECONNECT_KEY, true)
    }

    /// Codec name this side expects
    pub fn serialization(&self) -> &str {
        self.parameter(SERIALIZATION_KEY)
            .unwrap_or(serialization::DEFAULT_SERIALIZATION)
    }

    /// Default request timeout
    pub fn timeout(&self) -> Result<Duration> {
        self.parameter_or(TIMEOUT_KEY, DEFAULT_TIMEOUT_MS)
            .map(Duration::from_millis)
    }
}

impl FromStr for RemotingConfig {
    type Err = RemotingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RemotingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut url = self.url.clone();
        if !self.parameters.is_empty() {
            url.query_pairs_mut().extend_pairs(self.parameters.iter());
        }
        write!(f, "{}", url)
    }
}

/// Process-wide idle-check scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// Idle checks per configured interval
    pub check_divisor: i64,
    /// Tick used when `interval / check_divisor` is not positive
    pub least_duration_ms: i64,
    /// Wheel resolution
    pub tick_duration_ms: u64,
    /// Bucket count, rounded up to a power of two
    pub ticks_per_wheel: usize,
    /// Outstanding timeout limit, 0 for unbounded
    pub max_pending_timeouts: usize,
    /// Name of the wheel worker thread
    pub thread_name: String,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            check_divisor: HEARTBEAT_CHECK_TICK,
            least_duration_ms: LEAST_HEARTBEAT_DURATION_MS,
            tick_duration_ms: DEFAULT_TICK_DURATION_MS,
            ticks_per_wheel: DEFAULT_TICKS_PER_WHEEL,
            max_pending_timeouts: 0,
            thread_name: DEFAULT_TIMER_THREAD_NAME.to_string(),
        }
    }
}

impl TimerSettings {
    /// Parse settings from TOML; missing fields keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Self = toml::from_str(input).map_err(|e| {
            RemotingError::configuration(format!("Invalid timer settings: {}", e), None)
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading timer settings");
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_divisor <= 0 {
            return Err(RemotingError::configuration(
                "check_divisor must be positive",
                Some("check_divisor"),
            ));
        }
        if self.tick_duration_ms == 0 {
            return Err(RemotingError::configuration(
                "tick_duration_ms must be positive",
                Some("tick_duration_ms"),
            ));
        }
        if self.ticks_per_wheel == 0 || self.ticks_per_wheel > 1 << 30 {
            return Err(RemotingError::configuration(
                format!("ticks_per_wheel must be in 1..=2^30, got {}", self.ticks_per_wheel),
                Some("ticks_per_wheel"),
            ));
        }
        Ok(())
    }

    /// Wheel parameters for the shared timer
    pub fn wheel_config(&self) -> WheelConfig {
        WheelConfig {
            tick_duration: Duration::from_millis(self.tick_duration_ms),
            ticks_per_wheel: self.ticks_per_wheel,
            max_pending_timeouts: self.max_pending_timeouts,
            thread_name: self.thread_name.clone(),
        }
    }
}
