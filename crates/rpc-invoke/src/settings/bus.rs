//! Broadcast bus for configuration changes.

use crate::domain::config::BusConfig;
use crate::settings::{ConfigChangeEvent, ConfigEventHandler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// In-memory configuration event bus over `tokio::sync::broadcast`
pub struct ConfigEventBus {
    sender: broadcast::Sender<ConfigChangeEvent>,
    events_published: AtomicU64,
}

impl ConfigEventBus {
    pub fn new(config: &BusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            sender,
            events_published: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns the number of subscribers reached
    pub fn publish(&self, event: ConfigChangeEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let class_name = event.class_name.clone();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(class = %class_name, receivers, "Config change published");
                receivers
            }
            Err(_) => {
                warn!(class = %class_name, "Config change dropped (no subscribers)");
                0
            }
        }
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ConfigEventBus {
    fn default() -> Self {
        Self::new(&BusConfig::default())
    }
}

/// Routes change events to handlers
#[derive(Default, Clone)]
pub struct ConfigDispatcher {
    handlers: Vec<Arc<dyn ConfigEventHandler>>,
}

impl ConfigDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn ConfigEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Run every handler with a changed key; returns how many ran
    pub fn dispatch(&self, event: &ConfigChangeEvent) -> usize {
        let mut handled = 0;
        for handler in &self.handlers {
            if handler.keys().iter().any(|key| event.changed(key)) {
                debug!(handler = handler.name(), class = %event.class_name, "Dispatching config change");
                handler.handle(&event.class_name, &event.old, &event.new);
                handled += 1;
            }
        }
        handled
    }

    /// Consume events until the bus closes
    pub async fn run(self, mut receiver: broadcast::Receiver<ConfigChangeEvent>) {
        info!(handlers = self.handlers.len(), "Config dispatcher started");
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.dispatch(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Config dispatcher lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Config bus closed, dispatcher stopping");
                    break;
                }
            }
        }
    }
}
