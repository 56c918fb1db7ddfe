//! Filter chains.
//!
//! A filter wraps the next invoker in a chain and may short-circuit, rewrite
//! or observe the call. Filters are registered per [`Role`] in a
//! [`FilterRegistry`] and assembled per exporter/refer by the
//! [`FilterChainFactory`].

pub mod black_white;
pub mod chain;
pub mod concurrency;
pub mod limiter;
pub mod registry;
pub mod timeout;

pub use black_white::BlackWhiteList;
pub use chain::{FilterChainFactory, FilterInvoker};
pub use concurrency::ConcurrencyFilter;
pub use limiter::ProviderLimiterFilter;
pub use registry::{FilterMeta, FilterRegistry};
pub use timeout::ConsumerTimeoutFilter;

use crate::domain::{CallResult, InterfaceDescriptor, RequestEnvelope, RpcError, ServiceUrl};
use crate::invoker::Invoker;
use async_trait::async_trait;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

/// Which side of a call a chain is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Provider,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Provider => f.write_str("provider"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Filter classification bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterFlags(u8);

impl FilterFlags {
    pub const NONE: FilterFlags = FilterFlags(0);
    /// Shipped with the framework; excluded by the `-default` token
    pub const SYSTEM: FilterFlags = FilterFlags(1);
    /// Applied to every chain unless black-listed
    pub const GLOBAL: FilterFlags = FilterFlags(1 << 1);
    /// Always applied; immune to black/white lists
    pub const INNER: FilterFlags = FilterFlags(1 << 2);

    pub fn contains(self, other: FilterFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for FilterFlags {
    type Output = FilterFlags;

    fn bitor(self, rhs: FilterFlags) -> FilterFlags {
        FilterFlags(self.0 | rhs.0)
    }
}

/// The exporter or refer a chain is being built for
#[derive(Debug, Clone)]
pub struct FilterTarget {
    /// Logical chain name, stable across rebuilds
    pub name: String,
    pub interface: String,
    pub class: Option<Arc<InterfaceDescriptor>>,
    pub url: ServiceUrl,
}

/// Filter configuration problems
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterConfigError {
    #[error("{role} filter is not found: {name}")]
    UnknownFilter { role: Role, name: String },
}

/// A chain interceptor
#[async_trait]
pub trait Filter: Send + Sync {
    /// Called exactly once, after construction and before first use
    fn setup(&self) {}

    /// Intercept the call. Call `next.invoke(request)` to continue the chain.
    async fn invoke(
        &self,
        next: &dyn Invoker,
        request: &mut RequestEnvelope,
    ) -> Result<CallResult, RpcError>;

    async fn close(&self) -> Result<(), RpcError> {
        Ok(())
    }
}
