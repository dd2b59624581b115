//! Keep-alive probes for quiet channels

use super::idle::IdleCheck;
use crate::error::Result;
use crate::message::{Message, Request};
use crate::transport::Client;
use tracing::debug;

/// Sends a heartbeat request when a channel has been silent in either
/// direction for longer than the heartbeat interval.
///
/// The probe is fire-and-forget; its reply only matters because it
/// refreshes the channel's read timestamp.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatTask {
    heartbeat_ms: u64,
}

impl HeartbeatTask {
    pub fn new(heartbeat_ms: i64) -> Self {
        Self {
            heartbeat_ms: heartbeat_ms.max(0) as u64,
        }
    }

    pub fn heartbeat_ms(&self) -> u64 {
        self.heartbeat_ms
    }

    fn idle_since(&self, last: Option<u64>, now_ms: u64) -> bool {
        last.map_or(false, |at| now_ms.saturating_sub(at) > self.heartbeat_ms)
    }
}

impl IdleCheck for HeartbeatTask {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn check(&self, channel: &dyn Client, now_ms: u64) -> Result<bool> {
        let read_idle = self.idle_since(channel.last_read(), now_ms);
        let write_idle = self.idle_since(channel.last_write(), now_ms);
        if !(read_idle || write_idle) {
            return Ok(false);
        }

        let request = Request::heartbeat();
        let id = request.id;
        channel.send(Message::Request(request), false)?;
        debug!(
            remote = ?channel.remote_address(),
            request_id = id,
            heartbeat_ms = self.heartbeat_ms,
            read_idle,
            write_idle,
            "Send heartbeat to remote channel"
        );
        Ok(true)
    }
}
