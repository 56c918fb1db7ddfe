//! Invokers: anything a request can be handed to.
//!
//! Filter chain nodes, the local method dispatcher of an [`Exporter`] and the
//! cluster call of a [`Refer`] all implement [`Invoker`], so a chain can be
//! assembled from any mix of them.

pub mod exporter;
pub mod refer;

pub use exporter::{Exporter, LocalInvoker, MethodTable};
pub use refer::{ClusterInvoker, Refer};

use crate::domain::{CallResult, RequestEnvelope, RpcError};
use async_trait::async_trait;

/// Something a request can be invoked on
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Logical name of the owning exporter or refer
    fn name(&self) -> &str;

    /// Run the call. `Err` means the call itself failed; a business error
    /// raised by the method comes back as `CallResult::Exception`.
    async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError>;

    /// Release resources held by this invoker and everything behind it
    async fn close(&self) -> Result<(), RpcError>;
}
