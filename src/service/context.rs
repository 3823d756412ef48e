//! The data a service is configured with.

use crate::block::Block;
use crate::modules::{Authorizer, Persistence};
use crate::router::RouterSettings;
use serde_json::Value;
use std::sync::Arc;

/// Creates a fresh block instance of one declared type.
pub type BlockFactory = Arc<dyn Fn() -> Arc<dyn Block> + Send + Sync>;

/// One block to instantiate: its factory and its raw properties (which
/// must carry the block's `id`).
#[derive(Clone)]
pub struct BlockDefinition {
    pub factory: BlockFactory,
    pub properties: Value,
}

impl BlockDefinition {
    pub fn new(factory: BlockFactory, properties: Value) -> Self {
        BlockDefinition {
            factory,
            properties,
        }
    }
}

/// Everything `Service::configure` needs.
#[derive(Clone)]
pub struct ServiceContext {
    /// Raw service properties, including the `execution` wiring.
    pub properties: Value,
    pub blocks: Vec<BlockDefinition>,
    pub router_settings: RouterSettings,
    /// Data shared with every block through its configure context.
    pub component_data: Value,
    pub persistence: Option<Arc<dyn Persistence>>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    /// Fan configure/start/stop out across blocks on scoped threads
    /// instead of running them sequentially.
    pub parallel_lifecycle: bool,
}

impl ServiceContext {
    pub fn new(properties: Value, blocks: Vec<BlockDefinition>) -> Self {
        ServiceContext {
            properties,
            blocks,
            router_settings: RouterSettings::default(),
            component_data: Value::Null,
            persistence: None,
            authorizer: None,
            parallel_lifecycle: false,
        }
    }

    pub fn with_router_settings(mut self, settings: RouterSettings) -> Self {
        self.router_settings = settings;
        self
    }

    pub fn with_component_data(mut self, component_data: Value) -> Self {
        self.component_data = component_data;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_parallel_lifecycle(mut self) -> Self {
        self.parallel_lifecycle = true;
        self
    }
}
