//! Exchange client
//!
//! Wraps a transport [`Client`] in the request/response layer and, when asked
//! to, keeps it healthy: a reconnect task restores dead or silent links and a
//! heartbeat task keeps quiet ones from looking dead to the peer. Both run on
//! a shared [`IdleCheckScheduler`] and are cancelled when the client closes or
//! is dropped.

use super::idle::{ChannelProvider, TaskStatsSnapshot};
use super::scheduler::{ArmedTask, IdleCheckScheduler};
use super::{ChannelFactory, ExchangeChannel, HeartbeatTask, ReconnectTask, ResponseFuture};
use crate::config::RemotingConfig;
use crate::error::{RemotingError, Result};
use crate::message::Message;
use crate::transport::{AttributeValue, Channel, Client, Endpoint};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// Lifecycle of an [`ExchangeClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    /// Built, no idle checks running
    Created = 0,
    /// At least one idle check is scheduled
    Armed = 1,
    /// Draining; no new work accepted by the channel
    Closing = 2,
    Closed = 3,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Created,
            1 => ClientState::Armed,
            2 => ClientState::Closing,
            _ => ClientState::Closed,
        }
    }
}

/// Client and its correlation channel, seen by the idle checks as one link
struct ClientInner {
    client: Arc<dyn Client>,
    channel: Arc<dyn ExchangeChannel>,
}

impl Endpoint for ClientInner {
    fn config(&self) -> RemotingConfig {
        self.channel.config()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.channel.local_address()
    }

    fn close(&self) {
        self.channel.close()
    }

    fn close_with_timeout(&self, timeout: Duration) {
        self.channel.close_with_timeout(timeout)
    }

    fn start_close(&self) {
        self.channel.start_close()
    }

    fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl Channel for ClientInner {
    fn remote_address(&self) -> Option<SocketAddr> {
        self.channel.remote_address()
    }

    fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    fn last_read(&self) -> Option<u64> {
        self.channel.last_read()
    }

    fn last_write(&self) -> Option<u64> {
        self.channel.last_write()
    }

    fn send(&self, message: Message, sent: bool) -> Result<()> {
        self.channel.send(message, sent)
    }

    fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.channel.attribute(key)
    }

    fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.channel.set_attribute(key, value)
    }

    fn remove_attribute(&self, key: &str) {
        self.channel.remove_attribute(key)
    }

    fn has_attribute(&self, key: &str) -> bool {
        self.channel.has_attribute(key)
    }
}

impl Client for ClientInner {
    fn reconnect(&self) -> Result<()> {
        self.client.reconnect()
    }

    fn reset(&self, config: RemotingConfig) -> Result<()> {
        self.client.reset(config)
    }

    fn can_handle_idle(&self) -> bool {
        self.client.can_handle_idle()
    }
}

/// Provider yielding the owning client while it is alive
fn client_provider(inner: &Arc<ClientInner>) -> Box<dyn ChannelProvider> {
    let weak: Weak<ClientInner> = Arc::downgrade(inner);
    Box::new(move || match weak.upgrade() {
        Some(inner) => vec![inner as Arc<dyn Client>],
        None => Vec::new(),
    })
}

/// Builder for [`ExchangeClient`]
#[derive(Default)]
pub struct ExchangeClientBuilder {
    client: Option<Arc<dyn Client>>,
    channel_factory: Option<Arc<dyn ChannelFactory>>,
    scheduler: Option<Arc<IdleCheckScheduler>>,
    start_timer: bool,
}

impl ExchangeClientBuilder {
    pub fn client(mut self, client: Arc<dyn Client>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.channel_factory = Some(factory);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<IdleCheckScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Arm the reconnect and heartbeat checks
    pub fn start_timer(mut self, start_timer: bool) -> Self {
        self.start_timer = start_timer;
        self
    }

    pub fn build(self) -> Result<ExchangeClient> {
        let client = self
            .client
            .ok_or_else(|| RemotingError::precondition("client can't be null"))?;
        let factory = self
            .channel_factory
            .ok_or_else(|| RemotingError::precondition("channel factory is required"))?;
        if self.start_timer && self.scheduler.is_none() {
            return Err(RemotingError::precondition(
                "start_timer requires an idle-check scheduler",
            ));
        }

        let channel = factory.wrap(Arc::clone(&client))?;
        let mut exchange = ExchangeClient {
            inner: Arc::new(ClientInner { client, channel }),
            state: AtomicU8::new(ClientState::Created as u8),
            heartbeat: None,
            reconnect: None,
        };

        if self.start_timer {
            if let Some(scheduler) = self.scheduler.as_deref() {
                // On error the partially built client is dropped, cancelling
                // whatever was already armed.
                exchange.arm(scheduler)?;
            }
        }

        debug!(
            remote = ?exchange.remote_address(),
            heartbeat = exchange.has_heartbeat_task(),
            reconnect = exchange.has_reconnect_task(),
            "Exchange client created"
        );
        Ok(exchange)
    }
}

/// Client side of an exchange link
pub struct ExchangeClient {
    inner: Arc<ClientInner>,
    state: AtomicU8,
    heartbeat: Option<ArmedTask>,
    reconnect: Option<ArmedTask>,
}

impl ExchangeClient {
    pub fn builder() -> ExchangeClientBuilder {
        ExchangeClientBuilder::default()
    }

    /// Reconnect first, then heartbeat; intervals come from the current config
    fn arm(&mut self, scheduler: &IdleCheckScheduler) -> Result<()> {
        let config = self.inner.config();

        if config.should_reconnect() {
            let idle_timeout = config.idle_timeout()?;
            let task = scheduler.arm(
                ReconnectTask::new(idle_timeout),
                client_provider(&self.inner),
                idle_timeout,
            )?;
            self.reconnect = Some(task);
        }

        if !self.inner.can_handle_idle() {
            let heartbeat = config.heartbeat()?;
            let task = scheduler.arm(
                HeartbeatTask::new(heartbeat),
                client_provider(&self.inner),
                heartbeat,
            )?;
            self.heartbeat = Some(task);
        }

        if self.armed_tasks() > 0 {
            self.set_state(ClientState::Armed);
        }
        Ok(())
    }

    /// States only move forward
    fn set_state(&self, state: ClientState) {
        self.state.fetch_max(state as u8, Ordering::AcqRel);
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Two-way request with the configured timeout
    pub fn request(&self, data: Bytes) -> Result<ResponseFuture> {
        self.inner.channel.request(data, None)
    }

    pub fn request_with_timeout(&self, data: Bytes, timeout: Duration) -> Result<ResponseFuture> {
        self.inner.channel.request(data, Some(timeout))
    }

    pub fn send(&self, message: Message) -> Result<()> {
        self.inner.send(message, false)
    }

    /// Send; with `sent` wait until the message is written out
    pub fn send_with(&self, message: Message, sent: bool) -> Result<()> {
        self.inner.send(message, sent)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn local_address(&self) -> Option<SocketAddr> {
        self.inner.local_address()
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.inner.remote_address()
    }

    pub fn config(&self) -> RemotingConfig {
        self.inner.config()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.inner.attribute(key)
    }

    pub fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.inner.set_attribute(key, value)
    }

    pub fn remove_attribute(&self, key: &str) {
        self.inner.remove_attribute(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.inner.has_attribute(key)
    }

    /// Stop accepting new work; the link stays up until closed
    pub fn start_close(&self) {
        self.set_state(ClientState::Closing);
        self.inner.start_close();
    }

    pub fn close(&self) {
        self.cancel_tasks();
        self.inner.close();
        self.set_state(ClientState::Closed);
    }

    /// Drain, then close within `timeout`
    pub fn close_with_timeout(&self, timeout: Duration) {
        self.start_close();
        self.cancel_tasks();
        self.inner.close_with_timeout(timeout);
        self.set_state(ClientState::Closed);
    }

    /// Reconnect now, outside the reconnect task's schedule
    pub fn reconnect(&self) -> Result<()> {
        self.inner.reconnect()
    }

    /// Hand a new configuration to the transport.
    ///
    /// Idle-check intervals were fixed when the tasks were armed and are not
    /// recomputed here.
    pub fn reset(&self, config: RemotingConfig) -> Result<()> {
        self.inner.reset(config)
    }

    /// Merge `parameters` into the current configuration and [`Self::reset`]
    pub fn reset_parameters<I, K, V>(&self, parameters: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config = self.config().with_parameters(parameters);
        self.reset(config)
    }

    pub fn has_heartbeat_task(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn has_reconnect_task(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Idle checks armed at construction, cancelled or not
    pub fn armed_tasks(&self) -> usize {
        usize::from(self.heartbeat.is_some()) + usize::from(self.reconnect.is_some())
    }

    pub fn heartbeat_task(&self) -> Option<&ArmedTask> {
        self.heartbeat.as_ref()
    }

    pub fn reconnect_task(&self) -> Option<&ArmedTask> {
        self.reconnect.as_ref()
    }

    pub fn heartbeat_stats(&self) -> Option<TaskStatsSnapshot> {
        self.heartbeat.as_ref().map(|t| t.stats().snapshot())
    }

    pub fn reconnect_stats(&self) -> Option<TaskStatsSnapshot> {
        self.reconnect.as_ref().map(|t| t.stats().snapshot())
    }

    fn cancel_tasks(&self) {
        if let Some(task) = &self.heartbeat {
            if task.cancel() {
                debug!(remote = ?self.remote_address(), "Cancelled heartbeat task");
            }
        }
        if let Some(task) = &self.reconnect {
            if task.cancel() {
                debug!(remote = ?self.remote_address(), "Cancelled reconnect task");
            }
        }
    }
}

impl Drop for ExchangeClient {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("remote", &self.remote_address())
            .field("connected", &self.is_connected())
            .field("state", &self.state())
            .field("heartbeat", &self.has_heartbeat_task())
            .field("reconnect", &self.has_reconnect_task())
            .finish()
    }
}
