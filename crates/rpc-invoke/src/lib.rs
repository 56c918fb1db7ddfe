#![allow(missing_docs)]

//! rpc-invoke - Request-invocation pipeline of an RPC framework.
//!
//! Turns a decoded request into a dispatched method call, applies filters,
//! rate limits and routing on the way, and sends exactly one response back.
//!
//! # Architecture
//!
//! ```text
//!   transport ──► ProviderHandler ──► Exporter ──► filter chain ──► method
//!                 admission              │          concurrency
//!                 restore                │          limiter ◄── LimiterRegistry ◄── ConfigEventBus
//!                 lookup                 ▼
//!                                     Responder ──► injectors ──► Channel
//!
//!   Refer ──► consumer filter chain (timeout) ──► Route (pinpoint, roundRobin) ──► NodeInvoker
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rpc_invoke::{LocalRegistry, PendingCalls, ProviderHandler};
//!
//! let registry = Arc::new(LocalRegistry::new());
//! let handler = ProviderHandler::new(registry.clone(), registry, Arc::new(PendingCalls::new(timeout)))
//!     .with_builtins();
//! handler.handle(channel, request).finished().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod filter;
pub mod invoker;
pub mod limiter;
pub mod pipeline;
pub mod ports;
pub mod route;
pub mod settings;

// Re-exports for public API
pub use adapters::{LocalRegistry, MemoryChannel, MemorySession};
pub use domain::{
    codes, CallResult, InvokeConfig, Invocation, MessageHeader, RequestContext, RequestEnvelope,
    ResponseEnvelope, ResponsePayload, RpcError, RpcResult, ServiceUrl,
};
pub use filter::{Filter, FilterChainFactory, FilterRegistry, Role};
pub use invoker::{Exporter, Invoker, MethodTable, Refer};
pub use limiter::{LimiterConfigHandler, LimiterRegistry, RateLimiter};
pub use pipeline::{Dispatch, PendingCalls, ProviderHandler};
pub use route::{CandidatePool, Node, Route, RouteRegistry};
pub use settings::{ConfigChangeEvent, ConfigDispatcher, ConfigEventBus, ConfigEventHandler};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
