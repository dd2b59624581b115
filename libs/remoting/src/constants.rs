//! Configuration keys and defaults for the exchange layer

/// Heartbeat interval in milliseconds
pub const HEARTBEAT_KEY: &str = "heartbeat";

/// Idle timeout in milliseconds; reconnect threshold
pub const HEARTBEAT_TIMEOUT_KEY: &str = "heartbeat.timeout";

/// Whether the reconnect task is armed
pub const RECONNECT_KEY: &str = "reconnect";

/// Codec name this side expects
pub const SERIALIZATION_KEY: &str = "serialization";

/// Default request timeout in milliseconds
pub const TIMEOUT_KEY: &str = "timeout";

pub const DEFAULT_HEARTBEAT_MS: i64 = 60 * 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Idle timeout defaults to this many heartbeat intervals
pub const DEFAULT_IDLE_TIMEOUT_FACTOR: i64 = 3;

/// An idle timeout below this many heartbeat intervals is rejected
pub const MIN_IDLE_TIMEOUT_FACTOR: i64 = 2;

/// Each idle check runs this many times per configured interval
pub const HEARTBEAT_CHECK_TICK: i64 = 3;

/// Floor for an idle-check tick when the division yields nothing
pub const LEAST_HEARTBEAT_DURATION_MS: i64 = 1000;

pub const DEFAULT_TICK_DURATION_MS: u64 = 1000;
pub const DEFAULT_TICKS_PER_WHEEL: usize = 128;
pub const DEFAULT_TIMER_THREAD_NAME: &str = "remoting-idle-check";

/// Protocol version stamped on requests built by this layer
pub const PROTOCOL_VERSION: &str = "2.0.2";
