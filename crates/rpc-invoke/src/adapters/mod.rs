//! In-memory adapters for the outbound ports.

pub mod channel;
pub mod registry;
pub mod session;

pub use channel::MemoryChannel;
pub use registry::LocalRegistry;
pub use session::MemorySession;
