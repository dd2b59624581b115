//! Exchange layer
//!
//! Request/response correlation sits on top of a transport [`Client`]; this
//! module adds the client wrapper that keeps the link alive (heartbeats) and
//! brings it back when it dies (reconnects).

pub mod client;
pub mod heartbeat;
pub mod idle;
pub mod reconnect;
pub mod scheduler;

use crate::error::Result;
use crate::message::Response;
use crate::transport::{Channel, Client};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

pub use client::{ClientState, ExchangeClient, ExchangeClientBuilder};
pub use heartbeat::HeartbeatTask;
pub use idle::{
    calculate_least_duration, ChannelProvider, IdleCheck, IdleCheckTask, TaskStats,
    TaskStatsSnapshot,
};
pub use reconnect::ReconnectTask;
pub use scheduler::{ArmedTask, IdleCheckScheduler};

/// Future resolved with the peer's answer to a request
pub type ResponseFuture = BoxFuture<'static, Result<Response>>;

/// Channel that correlates requests with responses
pub trait ExchangeChannel: Channel {
    /// Send `data` as a two-way request; `None` uses the configured timeout
    fn request(&self, data: Bytes, timeout: Option<Duration>) -> Result<ResponseFuture>;
}

/// Wraps a transport client in the correlation layer
pub trait ChannelFactory: Send + Sync {
    fn wrap(&self, client: Arc<dyn Client>) -> Result<Arc<dyn ExchangeChannel>>;
}

impl<F> ChannelFactory for F
where
    F: Fn(Arc<dyn Client>) -> Result<Arc<dyn ExchangeChannel>> + Send + Sync,
{
    fn wrap(&self, client: Arc<dyn Client>) -> Result<Arc<dyn ExchangeChannel>> {
        self(client)
    }
}
