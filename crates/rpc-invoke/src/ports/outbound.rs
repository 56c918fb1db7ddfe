//! Outbound ports: the collaborators the pipeline consumes.
//!
//! Transport, session storage, service registry and remote calls are owned by
//! other components; the pipeline only depends on these contracts.

use crate::domain::{
    CallResult, ChannelError, Compression, InterfaceDescriptor, Invocation, RequestContext,
    RequestEnvelope, ResponseEnvelope, RpcError,
};
use crate::invoker::Exporter;
use crate::route::Node;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A connection to a peer
pub trait Channel: Send + Sync {
    /// Connection identifier, unique per process
    fn id(&self) -> u64;

    /// Backpressure signal: false while the outbound buffer is full
    fn is_writable(&self) -> bool;

    /// Enqueue a response. Never blocks; failures are reported, not retried.
    fn send(&self, response: ResponseEnvelope) -> Result<(), ChannelError>;

    fn local_addr(&self) -> SocketAddr;

    fn remote_addr(&self) -> SocketAddr;
}

/// Per-connection session negotiated at handshake
pub trait Session: Send + Sync {
    fn compression(&self) -> Compression;

    /// Interface bound to the session, for compact requests that omit it
    fn interface_name(&self) -> Option<String>;

    /// Alias bound to the session
    fn alias(&self) -> Option<String>;

    /// Arbitrary session attribute
    fn attribute(&self, key: &str) -> Option<String>;

    /// Application id of the remote caller
    fn remote_app_id(&self) -> Option<String> {
        self.attribute("remoteAppId")
    }
}

/// Lookup of locally exported services
pub trait ServiceRegistry: Send + Sync {
    /// Exporter for (interface, alias, local port)
    fn exporter(&self, class_name: &str, alias: &str, port: u16) -> Option<Arc<Exporter>>;

    /// Interface name registered under a legacy numeric interface id
    fn class_name_by_id(&self, interface_id: u64) -> Option<String>;
}

/// Resolution of interface names to method tables
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, class_name: &str) -> Option<Arc<InterfaceDescriptor>>;
}

/// Restores request metadata carried implicitly by the session
pub trait Transmit: Send + Sync {
    fn restore(&self, request: &mut RequestEnvelope);
}

/// Enriches every outgoing response (success or error)
pub trait ResponseInjector: Send + Sync {
    fn inject(
        &self,
        request: &RequestEnvelope,
        response: &mut ResponseEnvelope,
        exporter: Option<&Exporter>,
    );
}

/// Fires at most once when an in-flight call must be abandoned
pub type CancelSignal = oneshot::Receiver<RpcError>;

/// Timeout/cancellation bookkeeping for in-flight provider calls
pub trait InvocationCallback: Send + Sync {
    /// Track the call; the returned signal fires if it must be abandoned.
    fn register(&self, channel: &dyn Channel, request: &RequestEnvelope) -> CancelSignal;

    /// Stop tracking a call that completed naturally
    fn remove(&self, channel_id: u64, msg_id: u64);
}

/// A service method implementation
pub trait MethodHandler: Send + Sync {
    fn call(&self, invocation: &Invocation, context: &RequestContext) -> CallResult;
}

impl<F> MethodHandler for F
where
    F: Fn(&Invocation, &RequestContext) -> CallResult + Send + Sync,
{
    fn call(&self, invocation: &Invocation, context: &RequestContext) -> CallResult {
        self(invocation, context)
    }
}

/// The shared single-node call used by every route strategy
#[async_trait]
pub trait NodeInvoker: Send + Sync {
    /// Invoke `node`; `failed` lists nodes already tried by a retrying caller.
    async fn invoke(
        &self,
        node: &Node,
        failed: Option<&[Node]>,
        request: &mut RequestEnvelope,
    ) -> Result<CallResult, RpcError>;
}
