//! Remoting Exchange Client
//!
//! Client side of the request/response exchange layer. It wraps a transport
//! connection, keeps it alive with heartbeats, restores it when it dies, and
//! checks that every inbound body uses a codec this side agreed to.
//!
//! Idle checks for all clients share one hashed timing wheel, so thousands of
//! connections cost a single timer thread.

pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod message;
pub mod timer;
pub mod transport;

// Re-export commonly used types
pub use config::{RemotingConfig, TimerSettings};
pub use error::{RemotingError, Result};
pub use message::{next_request_id, Message, Request, Response, ResponseStatus};

pub use exchange::{
    calculate_least_duration, ArmedTask, ChannelFactory, ClientState, ExchangeChannel,
    ExchangeClient, ExchangeClientBuilder, IdleCheckScheduler, ResponseFuture, TaskStatsSnapshot,
};
pub use timer::{
    schedule_periodic, CancellationToken, Clock, HashedWheelTimer, ManualClock, PeriodicHandle,
    PeriodicJob, SystemClock, Timeout, Timer, TimerError, TimerTask, WheelConfig,
};
pub use transport::{AttributeMap, AttributeValue, Channel, Client, CodecRegistry, Endpoint};
