//! Dynamic service settings.
//!
//! A configuration source publishes [`ConfigChangeEvent`]s (old and new
//! attribute snapshots of one service) on the [`ConfigEventBus`]; the
//! [`ConfigDispatcher`] hands each event to the handlers whose keys changed.

pub mod bus;

pub use bus::{ConfigDispatcher, ConfigEventBus};

use std::collections::HashMap;
use std::sync::Arc;

/// Pseudo-service carrying settings shared by every service
pub const GLOBAL_SETTING: &str = "global_setting";

/// Attribute holding the provider rate limit configuration
pub const SETTING_INVOKE_PROVIDER_LIMIT: &str = "provider.limit";

/// Attribute snapshot of one service
pub type Attributes = HashMap<String, String>;

/// Settings of `class_name` changed from `old` to `new`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    pub class_name: String,
    pub old: Arc<Attributes>,
    pub new: Arc<Attributes>,
}

impl ConfigChangeEvent {
    pub fn new(class_name: impl Into<String>, old: Attributes, new: Attributes) -> Self {
        Self {
            class_name: class_name.into(),
            old: Arc::new(old),
            new: Arc::new(new),
        }
    }

    /// Whether the value of `key` differs between the snapshots
    pub fn changed(&self, key: &str) -> bool {
        self.old.get(key) != self.new.get(key)
    }
}

/// Reacts to changes of specific attributes
pub trait ConfigEventHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Attributes this handler cares about
    fn keys(&self) -> &[&'static str];

    fn handle(&self, class_name: &str, old: &Attributes, new: &Attributes);
}
