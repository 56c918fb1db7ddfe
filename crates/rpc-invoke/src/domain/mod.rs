//! Domain types for the invocation pipeline.
//!
//! This module contains the request/response model, errors and configuration.
//! Collaborator contracts live in `ports`.

pub mod config;
pub mod context;
pub mod error;
pub mod invocation;
pub mod message;
pub mod url;

// Re-exports for convenience
pub use config::{CallbackConfig, ConfigError, InvokeConfig};
pub use context::{CallId, RequestContext, HIDDEN_KEY_APP_ID, HIDDEN_KEY_CALL_ID, HIDDEN_KEY_PINPOINT};
pub use error::{codes, format_error, ChannelError, RpcError, RpcResult};
pub use invocation::{InterfaceDescriptor, Invocation, MethodDescriptor, MethodLookupError};
pub use message::{
    CallResult, Compression, MessageHeader, MsgType, RequestEnvelope, ResponseEnvelope,
    ResponsePayload,
};
pub use url::{ServiceUrl, UrlError};
