//! Per-call context: call id plus attachments propagated end-to-end.
//!
//! The context is an explicit value owned by the request. It is created when
//! the request is decoded and dropped with it, so nothing leaks between calls
//! that happen to share a worker thread.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// Attachment carrying the pin-point target address
pub const HIDDEN_KEY_PINPOINT: &str = ".pinpoint";
/// Attachment carrying the calling application id
pub const HIDDEN_KEY_APP_ID: &str = ".appId";
/// Attachment carrying the call id across processes
pub const HIDDEN_KEY_CALL_ID: &str = ".callId";

/// Identifier of one logical call, for log and trace correlation.
///
/// Uses UUID v7 which is time-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Generate a new call id (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried with every request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub call_id: CallId,
    attachments: HashMap<String, String>,
    pub local_addr: Option<SocketAddr>,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an attachment
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    pub fn set_attachment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attachments.insert(key.into(), value.into());
    }

    pub fn remove_attachment(&mut self, key: &str) -> Option<String> {
        self.attachments.remove(key)
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }
}
