//! In-process service registry.

use crate::domain::InterfaceDescriptor;
use crate::invoker::Exporter;
use crate::ports::{ClassResolver, ServiceRegistry};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Exporters, interface descriptors and legacy interface ids of this process
#[derive(Debug, Default)]
pub struct LocalRegistry {
    /// (interface, alias, port) → exporter
    exporters: DashMap<(String, String, u16), Arc<Exporter>>,
    interfaces: DashMap<String, Arc<InterfaceDescriptor>>,
    legacy_ids: DashMap<u64, String>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an exporter reachable; replaces one with the same key
    pub fn export(&self, exporter: Arc<Exporter>) -> Option<Arc<Exporter>> {
        let key = (
            exporter.interface().to_string(),
            exporter.alias().to_string(),
            exporter.port(),
        );
        info!(exporter = exporter.name(), "Exporter registered");
        self.exporters.insert(key, exporter)
    }

    /// Withdraw an exporter. The caller is responsible for closing it.
    pub fn unexport(&self, interface: &str, alias: &str, port: u16) -> Option<Arc<Exporter>> {
        let removed = self
            .exporters
            .remove(&(interface.to_string(), alias.to_string(), port))
            .map(|(_, exporter)| exporter);
        if let Some(exporter) = &removed {
            info!(exporter = exporter.name(), "Exporter removed");
        }
        removed
    }

    pub fn register_interface(&self, descriptor: Arc<InterfaceDescriptor>) {
        debug!(interface = descriptor.name(), "Interface registered");
        self.interfaces
            .insert(descriptor.name().to_string(), descriptor);
    }

    /// Register the numeric id older clients send instead of the interface name
    pub fn register_legacy_id(&self, id: u64, class_name: impl Into<String>) {
        self.legacy_ids.insert(id, class_name.into());
    }

    pub fn exporter_count(&self) -> usize {
        self.exporters.len()
    }
}

impl ServiceRegistry for LocalRegistry {
    fn exporter(&self, class_name: &str, alias: &str, port: u16) -> Option<Arc<Exporter>> {
        self.exporters
            .get(&(class_name.to_string(), alias.to_string(), port))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn class_name_by_id(&self, interface_id: u64) -> Option<String> {
        self.legacy_ids
            .get(&interface_id)
            .map(|entry| entry.value().clone())
    }
}

impl ClassResolver for LocalRegistry {
    fn resolve(&self, class_name: &str) -> Option<Arc<InterfaceDescriptor>> {
        self.interfaces
            .get(class_name)
            .map(|entry| Arc::clone(entry.value()))
    }
}
