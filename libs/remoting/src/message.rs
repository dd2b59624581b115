//! Exchange messages
//!
//! The exchange layer only builds and inspects these envelopes; turning
//! them into frames is the transport's job.

use crate::constants::PROTOCOL_VERSION;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a process-unique request id
pub fn next_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub version: String,
    /// Peer is expected to answer
    pub two_way: bool,
    /// Control event (heartbeat) rather than an invocation
    pub event: bool,
    pub data: Option<Bytes>,
}

impl Request {
    /// Two-way request carrying `data`
    pub fn new(data: Bytes) -> Self {
        Self {
            id: next_request_id(),
            version: PROTOCOL_VERSION.to_string(),
            two_way: true,
            event: false,
            data: Some(data),
        }
    }

    /// Request that expects no answer
    pub fn one_way(data: Bytes) -> Self {
        Self {
            two_way: false,
            ..Self::new(data)
        }
    }

    /// Keep-alive probe. Two-way so the reply refreshes the read timestamp.
    pub fn heartbeat() -> Self {
        Self {
            id: next_request_id(),
            version: PROTOCOL_VERSION.to_string(),
            two_way: true,
            event: true,
            data: None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event && self.data.is_none()
    }
}

/// Response status codes shared with peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseStatus {
    Ok = 20,
    ClientTimeout = 30,
    ServerTimeout = 31,
    ChannelInactive = 35,
    BadRequest = 40,
    BadResponse = 50,
    ServiceError = 70,
}

/// Inbound response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request answered
    pub id: u64,
    pub version: String,
    pub status: ResponseStatus,
    pub event: bool,
    pub result: Option<Bytes>,
    pub error_message: Option<String>,
}

impl Response {
    pub fn ok(id: u64, result: Option<Bytes>) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            status: ResponseStatus::Ok,
            event: false,
            result,
            error_message: None,
        }
    }

    pub fn error(id: u64, status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            status,
            event: false,
            result: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event && self.result.is_none()
    }
}

/// Anything an exchange channel can put on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    /// Opaque body the transport passes through untouched
    Payload(Bytes),
}

impl Message {
    pub fn is_heartbeat(&self) -> bool {
        match self {
            Message::Request(request) => request.is_heartbeat(),
            Message::Response(response) => response.is_heartbeat(),
            Message::Payload(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new(Bytes::from_static(b"a"));
        let b = Request::heartbeat();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_heartbeat_shape() {
        let hb = Request::heartbeat();
        assert!(hb.two_way);
        assert!(hb.event);
        assert!(hb.is_heartbeat());
        assert_eq!(hb.version, PROTOCOL_VERSION);
        assert!(Message::Request(hb).is_heartbeat());
        assert!(!Message::Request(Request::new(Bytes::new())).is_heartbeat());
    }

    #[test]
    fn test_one_way() {
        let request = Request::one_way(Bytes::from_static(b"fire"));
        assert!(!request.two_way);
        assert!(!request.is_heartbeat());
    }

    #[test]
    fn test_response_status() {
        assert!(Response::ok(1, None).is_ok());
        let failed = Response::error(2, ResponseStatus::ChannelInactive, "channel closed");
        assert!(!failed.is_ok());
        assert_eq!(failed.status as u8, 35);
    }
}
