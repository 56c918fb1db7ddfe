//! Decoded request/response envelopes and invoker results.
//!
//! The codec produces a [`RequestEnvelope`]; the pipeline produces exactly one
//! [`ResponseEnvelope`] for it (or none, when the request is discarded).

use crate::domain::context::RequestContext;
use crate::domain::error::RpcError;
use crate::domain::invocation::Invocation;
use crate::ports::Session;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Message type on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    BizReq,
    BizResp,
}

/// Body compression negotiated for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    Lz4,
    Snappy,
    Zlib,
}

/// Message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Correlation id, unique per connection while the call is in flight
    pub msg_id: u64,
    pub msg_type: MsgType,
    /// Client-observed timeout; zero means none
    pub timeout: Duration,
    pub compression: Compression,
}

impl MessageHeader {
    pub fn request(msg_id: u64, timeout: Duration) -> Self {
        Self {
            msg_id,
            msg_type: MsgType::BizReq,
            timeout,
            compression: Compression::None,
        }
    }

    /// Header of the response mirroring this request
    pub fn response(&self, msg_type: MsgType, compression: Compression) -> Self {
        Self {
            msg_id: self.msg_id,
            msg_type,
            timeout: self.timeout,
            compression,
        }
    }
}

/// Inbound request
pub struct RequestEnvelope {
    pub header: MessageHeader,
    pub payload: Invocation,
    /// Session looked up by connection; not owned by the request
    pub session: Option<Arc<dyn Session>>,
    pub context: RequestContext,
    pub receive_time: Instant,
    pub local_addr: Option<SocketAddr>,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestEnvelope {
    /// Request received now
    pub fn new(header: MessageHeader, payload: Invocation) -> Self {
        Self {
            header,
            payload,
            session: None,
            context: RequestContext::new(),
            receive_time: Instant::now(),
            local_addr: None,
            remote_addr: None,
        }
    }

    /// Builder: attach the connection's session
    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Builder: replace the propagated context
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Builder: override the receive timestamp
    pub fn with_receive_time(mut self, receive_time: Instant) -> Self {
        self.receive_time = receive_time;
        self
    }

    /// Whether the client has already given up on this request.
    pub fn is_timeout(&self) -> bool {
        !self.header.timeout.is_zero() && self.receive_time.elapsed() > self.header.timeout
    }

    /// Time left before the client gives up, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        if self.header.timeout.is_zero() {
            return None;
        }
        Some(self.header.timeout.saturating_sub(self.receive_time.elapsed()))
    }
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("header", &self.header)
            .field("class", &self.payload.class_name)
            .field("method", &self.payload.method_name)
            .field("alias", &self.payload.alias)
            .field("call_id", &self.context.call_id)
            .finish()
    }
}

/// Response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Value(serde_json::Value),
    Exception(RpcError),
}

impl ResponsePayload {
    pub fn from_result(result: Result<serde_json::Value, RpcError>) -> Self {
        match result {
            Ok(value) => ResponsePayload::Value(value),
            Err(error) => ResponsePayload::Exception(error),
        }
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            ResponsePayload::Value(value) => Some(value),
            ResponsePayload::Exception(_) => None,
        }
    }

    pub fn exception(&self) -> Option<&RpcError> {
        match self {
            ResponsePayload::Value(_) => None,
            ResponsePayload::Exception(error) => Some(error),
        }
    }
}

/// Outbound response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub header: MessageHeader,
    pub payload: ResponsePayload,
    /// Attachments added by response injectors
    pub attachments: HashMap<String, String>,
}

impl ResponseEnvelope {
    pub fn new(header: MessageHeader, payload: ResponsePayload) -> Self {
        Self {
            header,
            payload,
            attachments: HashMap::new(),
        }
    }

    /// Whether the peer is being told to close this connection
    pub fn requires_close(&self) -> bool {
        self.payload
            .exception()
            .map(RpcError::is_shutdown)
            .unwrap_or(false)
    }
}

/// What an invoker resolves to when the call itself went through.
///
/// A failed call is the `Err` of the invoke future; `Exception` is a business
/// error raised by the method; `Async` is a method that returned a future of
/// its own.
pub enum CallResult {
    Value(serde_json::Value),
    Exception(RpcError),
    Async(BoxFuture<'static, Result<serde_json::Value, RpcError>>),
}

impl CallResult {
    pub fn is_async(&self) -> bool {
        matches!(self, CallResult::Async(_))
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, CallResult::Exception(_))
    }

    /// Wait for a deferred value; ready results resolve immediately.
    pub async fn resolve(self) -> Result<serde_json::Value, RpcError> {
        match self {
            CallResult::Value(value) => Ok(value),
            CallResult::Exception(error) => Err(error),
            CallResult::Async(future) => future.await,
        }
    }
}

impl fmt::Debug for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallResult::Value(value) => f.debug_tuple("Value").field(value).finish(),
            CallResult::Exception(error) => f.debug_tuple("Exception").field(error).finish(),
            CallResult::Async(_) => f.write_str("Async(..)"),
        }
    }
}
