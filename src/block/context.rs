//! The data a block is configured with.

use crate::modules::Persistence;
use crate::router::BlockRouter;
use serde_json::Value;
use std::sync::Arc;

/// Carries everything `configure` binds onto a block: the router it will
/// notify, its raw properties, data shared across the service's blocks,
/// the owning service's name, the URL the block is commandable at, and an
/// optional persistence store.
#[derive(Clone)]
pub struct BlockContext {
    pub router: Arc<BlockRouter>,
    pub properties: Value,
    pub component_data: Value,
    pub service_name: String,
    pub command_url: String,
    pub persistence: Option<Arc<dyn Persistence>>,
}

impl BlockContext {
    pub fn new(router: Arc<BlockRouter>, properties: Value) -> Self {
        BlockContext {
            router,
            properties,
            component_data: Value::Null,
            service_name: String::new(),
            command_url: String::new(),
            persistence: None,
        }
    }

    pub fn with_component_data(mut self, component_data: Value) -> Self {
        self.component_data = component_data;
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_command_url(mut self, command_url: impl Into<String>) -> Self {
        self.command_url = command_url.into();
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }
}
