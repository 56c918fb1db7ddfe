use crate::domain::{ChannelError, ResponseEnvelope};
use crate::ports::Channel;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory channel over a bounded mpsc queue.
///
/// The channel stops being writable once the queue is full, or while paused.
pub struct MemoryChannel {
    id: u64,
    sender: mpsc::Sender<ResponseEnvelope>,
    paused: AtomicBool,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
}

impl MemoryChannel {
    /// Create a channel and the receiving end of its outbound queue
    pub fn create(
        buffer: usize,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
    ) -> (Self, mpsc::Receiver<ResponseEnvelope>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let channel = Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            sender,
            paused: AtomicBool::new(false),
            local_addr,
            remote_addr,
        };
        (channel, receiver)
    }

    /// Simulate a congested peer
    pub fn set_writable(&self, writable: bool) {
        self.paused.store(!writable, Ordering::Release);
    }
}

impl Channel for MemoryChannel {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_writable(&self) -> bool {
        !self.paused.load(Ordering::Acquire) && self.sender.capacity() > 0
    }

    fn send(&self, response: ResponseEnvelope) -> Result<(), ChannelError> {
        self.sender.try_send(response).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ChannelError::SendFailed("outbound buffer is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
