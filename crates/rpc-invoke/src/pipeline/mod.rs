//! Provider-side request pipeline.
//!
//! [`ProviderHandler`] admits a decoded request, restores its invocation from
//! the session, finds the exporter and runs the call in a spawned task.
//! [`Responder`] guarantees a single response per request even when the call
//! races a timeout fired by [`PendingCalls`].

pub mod handler;
pub mod pending;
pub mod responder;
pub mod stats;
pub mod transmit;

pub use handler::{DiscardReason, Dispatch, ProviderHandler};
pub use pending::{sweep_task, PendingCalls, PendingStats};
pub use responder::Responder;
pub use stats::{PipelineStats, StatsSnapshot};
pub use transmit::{AppIdTransmit, CallIdInjection};
