use crate::domain::Compression;
use crate::ports::Session;
use std::collections::HashMap;

/// Session negotiated in memory, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    compression: Compression,
    interface_name: Option<String>,
    alias: Option<String>,
    attributes: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_interface(mut self, interface_name: impl Into<String>) -> Self {
        self.interface_name = Some(interface_name.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl Session for MemorySession {
    fn compression(&self) -> Compression {
        self.compression
    }

    fn interface_name(&self) -> Option<String> {
        self.interface_name.clone()
    }

    fn alias(&self) -> Option<String> {
        self.alias.clone()
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).cloned()
    }
}
