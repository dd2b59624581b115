//! Shared fixtures: an in-memory transport client driven by a manual clock

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use remoting::exchange::{ExchangeChannel, ResponseFuture};
use remoting::{
    AttributeMap, AttributeValue, Channel, ChannelFactory, Client, Clock, Endpoint,
    IdleCheckScheduler, ManualClock, Message, RemotingConfig, RemotingError, Request, Response,
    Result, TimerSettings,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

pub const START_MS: u64 = 1_000_000;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Transport client whose link state is set by the test
pub struct MockClient {
    config: Mutex<RemotingConfig>,
    clock: Arc<ManualClock>,
    connected: AtomicBool,
    closed: AtomicBool,
    handles_idle: bool,
    fail_reconnect: AtomicBool,
    last_read: Mutex<Option<u64>>,
    last_write: Mutex<Option<u64>>,
    sent: Mutex<Vec<Message>>,
    reconnects: AtomicUsize,
    resets: Mutex<Vec<RemotingConfig>>,
    events: Mutex<Vec<&'static str>>,
    attributes: AttributeMap,
}

impl MockClient {
    pub fn new(url: &str, clock: Arc<ManualClock>) -> Arc<Self> {
        Self::build(url, clock, false)
    }

    /// Client that reports its own idle handling
    pub fn idle_aware(url: &str, clock: Arc<ManualClock>) -> Arc<Self> {
        Self::build(url, clock, true)
    }

    fn build(url: &str, clock: Arc<ManualClock>, handles_idle: bool) -> Arc<Self> {
        let now = clock.now_ms();
        Arc::new(Self {
            config: Mutex::new(RemotingConfig::parse(url).unwrap()),
            clock,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            handles_idle,
            fail_reconnect: AtomicBool::new(false),
            last_read: Mutex::new(Some(now)),
            last_write: Mutex::new(Some(now)),
            sent: Mutex::new(Vec::new()),
            reconnects: AtomicUsize::new(0),
            resets: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            attributes: AttributeMap::new(),
        })
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn fail_reconnects(&self, fail: bool) {
        self.fail_reconnect.store(fail, Ordering::SeqCst);
    }

    /// Pretend the peer just sent something
    pub fn touch_read(&self) {
        *self.last_read.lock() = Some(self.clock.now_ms());
    }

    pub fn set_last_read(&self, at: Option<u64>) {
        *self.last_read.lock() = at;
    }

    pub fn set_last_write(&self, at: Option<u64>) {
        *self.last_write.lock() = at;
    }

    pub fn heartbeats_sent(&self) -> usize {
        self.sent.lock().iter().filter(|m| m.is_heartbeat()).count()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> Vec<RemotingConfig> {
        self.resets.lock().clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

impl Endpoint for MockClient {
    fn config(&self) -> RemotingConfig {
        self.config.lock().clone()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        Some("127.0.0.1:50000".parse().unwrap())
    }

    fn close(&self) {
        self.events.lock().push("close");
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn close_with_timeout(&self, _timeout: Duration) {
        self.events.lock().push("close_with_timeout");
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn start_close(&self) {
        self.events.lock().push("start_close");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Channel for MockClient {
    fn remote_address(&self) -> Option<SocketAddr> {
        Some("127.0.0.1:20880".parse().unwrap())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn last_read(&self) -> Option<u64> {
        *self.last_read.lock()
    }

    fn last_write(&self) -> Option<u64> {
        *self.last_write.lock()
    }

    fn send(&self, message: Message, _sent: bool) -> Result<()> {
        if self.is_closed() {
            return Err(RemotingError::closed("channel closed", self.remote_address()));
        }
        if !self.is_connected() {
            return Err(RemotingError::connection("not connected", self.remote_address()));
        }
        self.sent.lock().push(message);
        *self.last_write.lock() = Some(self.clock.now_ms());
        Ok(())
    }

    fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.get(key)
    }

    fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.attributes.set(key, value)
    }

    fn remove_attribute(&self, key: &str) {
        self.attributes.remove(key)
    }
}

impl Client for MockClient {
    fn reconnect(&self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnect.load(Ordering::SeqCst) {
            return Err(RemotingError::connection("connection refused", self.remote_address()));
        }
        let now = self.clock.now_ms();
        self.connected.store(true, Ordering::SeqCst);
        *self.last_read.lock() = Some(now);
        *self.last_write.lock() = Some(now);
        Ok(())
    }

    fn reset(&self, config: RemotingConfig) -> Result<()> {
        self.resets.lock().push(config.clone());
        *self.config.lock() = config;
        Ok(())
    }

    fn can_handle_idle(&self) -> bool {
        self.handles_idle
    }
}

/// Correlation layer that answers every request with its own payload
pub struct EchoChannel {
    client: Arc<dyn Client>,
}

impl EchoChannel {
    pub fn factory() -> Arc<dyn ChannelFactory> {
        Arc::new(
            |client: Arc<dyn Client>| -> Result<Arc<dyn ExchangeChannel>> {
                Ok(Arc::new(EchoChannel { client }))
            },
        )
    }
}

impl Endpoint for EchoChannel {
    fn config(&self) -> RemotingConfig {
        self.client.config()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.client.local_address()
    }

    fn close(&self) {
        self.client.close()
    }

    fn close_with_timeout(&self, timeout: Duration) {
        self.client.close_with_timeout(timeout)
    }

    fn start_close(&self) {
        self.client.start_close()
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl Channel for EchoChannel {
    fn remote_address(&self) -> Option<SocketAddr> {
        self.client.remote_address()
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn last_read(&self) -> Option<u64> {
        self.client.last_read()
    }

    fn last_write(&self) -> Option<u64> {
        self.client.last_write()
    }

    fn send(&self, message: Message, sent: bool) -> Result<()> {
        self.client.send(message, sent)
    }

    fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.client.attribute(key)
    }

    fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.client.set_attribute(key, value)
    }

    fn remove_attribute(&self, key: &str) {
        self.client.remove_attribute(key)
    }
}

impl ExchangeChannel for EchoChannel {
    fn request(&self, data: Bytes, _timeout: Option<Duration>) -> Result<ResponseFuture> {
        let request = Request::new(data.clone());
        let id = request.id;
        self.client.send(Message::Request(request), false)?;
        Ok(Box::pin(async move { Ok(Response::ok(id, Some(data))) }))
    }
}

pub fn manual_scheduler() -> (Arc<IdleCheckScheduler>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let scheduler = IdleCheckScheduler::manual(TimerSettings::default(), clock.clone()).unwrap();
    (scheduler, clock)
}

/// Advance the clock one wheel tick at a time, firing due checks
pub fn advance(scheduler: &IdleCheckScheduler, clock: &ManualClock, ms: u64) {
    let tick = scheduler.settings().tick_duration_ms;
    for _ in 0..ms / tick {
        clock.advance(Duration::from_millis(tick));
        scheduler.advance();
    }
}
