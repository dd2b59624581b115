//! Connection recovery

use super::idle::IdleCheck;
use crate::error::Result;
use crate::transport::Client;
use tracing::{info, warn};

/// Reconnects channels that dropped, or that have not heard from the peer
/// for longer than the idle timeout.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectTask {
    idle_timeout_ms: u64,
}

impl ReconnectTask {
    pub fn new(idle_timeout_ms: i64) -> Self {
        Self {
            idle_timeout_ms: idle_timeout_ms.max(0) as u64,
        }
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }
}

impl IdleCheck for ReconnectTask {
    fn name(&self) -> &'static str {
        "reconnect"
    }

    fn check(&self, channel: &dyn Client, now_ms: u64) -> Result<bool> {
        if !channel.is_connected() {
            info!(remote = ?channel.remote_address(), "Channel disconnected, reconnecting");
            channel.reconnect()?;
            return Ok(true);
        }

        match channel.last_read() {
            Some(last_read) if now_ms.saturating_sub(last_read) > self.idle_timeout_ms => {
                warn!(
                    remote = ?channel.remote_address(),
                    idle_timeout_ms = self.idle_timeout_ms,
                    idle_ms = now_ms.saturating_sub(last_read),
                    "Reconnect to channel, because heartbeat read idle time out"
                );
                channel.reconnect()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
