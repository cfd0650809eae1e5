use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::transport::Transport;

/// Lookup of registered transports by instance id. A single instance is
/// constructed at startup and shared through `Arc`.
#[derive(Default)]
pub struct TransportRegistry {
    transports: DashMap<String, Arc<dyn Transport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            transports: DashMap::new(),
        }
    }

    pub fn register(&self, transport: Arc<dyn Transport>) {
        let id = transport.id().to_string();
        info!(instance = %id, "transport registered");
        self.transports.insert(id, transport);
    }

    /// Returns the transport for `instance_id`, if one is registered. Its
    /// presence decides whether delivery is scheduled asynchronously
    /// through the humanizer or skipped.
    pub fn get(&self, instance_id: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(instance_id).map(|e| Arc::clone(e.value()))
    }
}
