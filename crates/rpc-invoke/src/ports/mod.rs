//! Ports (hexagonal architecture) for external collaborators.

pub mod outbound;

pub use outbound::{
    CancelSignal, Channel, ClassResolver, InvocationCallback, MethodHandler, NodeInvoker,
    ResponseInjector, ServiceRegistry, Session, Transmit,
};
