//! Transport collaborators
//!
//! The exchange layer never owns sockets. It talks to the connection through
//! these traits, which the transport implements; the codec registry that
//! decoders consult lives alongside them.

pub mod codec;

use crate::config::RemotingConfig;
use crate::error::Result;
use crate::message::Message;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub use codec::{CodecRegistry, CodecRegistryBuilder};

/// Value stored in a channel's attribute map
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// Something with a configuration and a close lifecycle
pub trait Endpoint: Send + Sync {
    fn config(&self) -> RemotingConfig;

    fn local_address(&self) -> Option<SocketAddr>;

    fn close(&self);

    /// Close, letting in-flight work finish within `timeout`
    fn close_with_timeout(&self, timeout: Duration);

    /// Stop accepting new work without severing the link
    fn start_close(&self);

    fn is_closed(&self) -> bool;
}

/// One logical link to a peer
pub trait Channel: Endpoint {
    fn remote_address(&self) -> Option<SocketAddr>;

    fn is_connected(&self) -> bool;

    /// Clock milliseconds of the last inbound message
    fn last_read(&self) -> Option<u64>;

    /// Clock milliseconds of the last outbound message
    fn last_write(&self) -> Option<u64>;

    /// Send `message`; with `sent` the call waits until it is written out
    fn send(&self, message: Message, sent: bool) -> Result<()>;

    fn attribute(&self, key: &str) -> Option<AttributeValue>;

    fn set_attribute(&self, key: &str, value: AttributeValue);

    fn remove_attribute(&self, key: &str);

    fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }
}

/// Client side of a link, able to re-establish it
pub trait Client: Channel {
    /// Replace the underlying socket. Must be bounded in time.
    fn reconnect(&self) -> Result<()>;

    /// Apply a new configuration to the connection
    fn reset(&self, config: RemotingConfig) -> Result<()>;

    /// Whether the connection already runs its own idle detection
    fn can_handle_idle(&self) -> bool {
        false
    }
}

/// Thread-safe attribute store for channel implementations
#[derive(Default)]
pub struct AttributeMap {
    entries: RwLock<HashMap<String, AttributeValue>>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<AttributeValue> {
        self.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: AttributeValue) {
        self.entries.write().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        f.debug_struct("AttributeMap").field("keys", &keys).finish()
    }
}
