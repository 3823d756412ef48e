//! Services: configured, runnable graphs of block instances plus wiring.
//!
//! The service shell drives the lifecycle state machine over its router
//! and blocks: configure binds contexts, start fans out in declaration
//! order (aborting on the first failure), and stop is best-effort so one
//! failing block cannot leak the resources of the others.
//! Block fan-out may optionally run on scoped threads per block; that is
//! a shell configuration choice, never a router concern.

mod command;
mod context;
mod execution;

pub use command::CommandMessage;
pub use context::{BlockDefinition, BlockFactory, ServiceContext};
pub use execution::{BlockExecution, ReceiverRef, ReceiverSpec, execution_from_value};

use crate::block::{Block, BlockContext, BlockError};
use crate::modules::{Authorizer, Unauthorized};
use crate::properties::{PropertyBag, PropertyError, PropertySet, PropertySpec};
use crate::router::{BlockRouter, RouterContext, RouterError};
use crate::status::{RunnerStatus, StatusFlags, StatusSet};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service is not configured")]
    NotConfigured,

    #[error("invalid service configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown block: {0}")]
    UnknownBlock(String),
}

static SERVICE_PROPERTIES: Lazy<PropertySet> = Lazy::new(|| {
    PropertySet::builder()
        .property(PropertySpec::version("1.0.0"))
        .property(PropertySpec::string("id", "Id"))
        .property(PropertySpec::string("type", "Type").hidden().readonly())
        .property(PropertySpec::bool("auto_start", "Auto-start").with_default(json!(false)))
        .property(PropertySpec::any("execution", "Execution").with_default(json!([])))
        .property(PropertySpec::string("sys_metadata", "Metadata").with_default(json!("")))
        .build()
});

/// A runnable graph of blocks plus the router that wires them together.
pub struct Service {
    status: StatusFlags,
    id: String,
    properties: Option<PropertyBag>,
    blocks: IndexMap<String, Arc<dyn Block>>,
    router: Option<Arc<BlockRouter>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    parallel_lifecycle: bool,
}

impl Service {
    pub fn new() -> Self {
        let status = StatusFlags::with_initial(RunnerStatus::Created);
        status.set_callback(Arc::new(|old, new| {
            log::info!("service status changed from [{old}] to [{new}]");
        }));
        Service {
            status,
            id: String::new(),
            properties: None,
            blocks: IndexMap::new(),
            router: None,
            authorizer: None,
            parallel_lifecycle: false,
        }
    }

    /// The service-level property declarations.
    pub fn properties() -> &'static PropertySet {
        &SERVICE_PROPERTIES
    }

    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn blocks(&self) -> &IndexMap<String, Arc<dyn Block>> {
        &self.blocks
    }

    pub fn router(&self) -> Option<&Arc<BlockRouter>> {
        self.router.as_ref()
    }

    /// Whether the host should start this service when it boots.
    pub fn auto_start(&self) -> bool {
        self.properties
            .as_ref()
            .and_then(|bag| bag.resolve_bool("auto_start", None).ok())
            .unwrap_or(false)
    }

    /// Binds configuration: service properties, block instantiation and
    /// configuration, router table construction.
    pub fn configure(&mut self, context: ServiceContext) -> Result<(), ServiceError> {
        self.status.set(RunnerStatus::Configuring);
        match self.on_configure(context) {
            Ok(()) => {
                self.status.set(RunnerStatus::Configured);
                Ok(())
            }
            Err(e) => {
                log::error!("failed to configure service: {e}");
                self.status.add(RunnerStatus::Error);
                Err(e)
            }
        }
    }

    fn on_configure(&mut self, context: ServiceContext) -> Result<(), ServiceError> {
        let mut bag = PropertyBag::new(Service::properties());
        bag.from_dict(&context.properties)?;
        let id = match bag.raw("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(ServiceError::Configuration(
                    "service configuration must carry a non-empty 'id'".into(),
                ));
            }
        };
        let empty_execution = json!([]);
        let execution =
            execution_from_value(bag.raw("execution").unwrap_or(&empty_execution)).map_err(
                |e| ServiceError::Configuration(format!("invalid execution specification: {e}")),
            )?;

        let router = Arc::new(BlockRouter::new());

        // instantiate blocks first so duplicate ids fail before any
        // configure call runs
        let mut entries: Vec<(String, Arc<dyn Block>, BlockDefinition)> = Vec::new();
        let mut blocks: IndexMap<String, Arc<dyn Block>> = IndexMap::new();
        for definition in &context.blocks {
            let block_id = match definition.properties.get("id").and_then(Value::as_str) {
                Some(block_id) if !block_id.is_empty() => block_id.to_string(),
                _ => {
                    return Err(ServiceError::Configuration(
                        "every block configuration must carry a non-empty 'id'".into(),
                    ));
                }
            };
            if blocks.contains_key(&block_id) {
                return Err(ServiceError::Configuration(format!(
                    "duplicate block id: {block_id}"
                )));
            }
            let block = (definition.factory)();
            blocks.insert(block_id.clone(), block.clone());
            entries.push((block_id, block, definition.clone()));
        }

        let configure_one = |(block_id, block, definition): &(
            String,
            Arc<dyn Block>,
            BlockDefinition,
        )|
         -> Result<(), ServiceError> {
            let block_context = BlockContext {
                router: router.clone(),
                properties: definition.properties.clone(),
                component_data: context.component_data.clone(),
                service_name: id.clone(),
                command_url: format!("/services/{id}/{block_id}/"),
                persistence: context.persistence.clone(),
            };
            block.status().set(RunnerStatus::Configuring);
            match block.configure(block_context) {
                Ok(()) => {
                    block.status().set(RunnerStatus::Configured);
                    Ok(())
                }
                Err(e) => {
                    log::error!("block '{block_id}' failed to configure: {e}");
                    block.status().add(RunnerStatus::Error);
                    Err(e.into())
                }
            }
        };
        if context.parallel_lifecycle {
            fan_out(entries.iter(), configure_one)?;
        } else {
            for entry in &entries {
                configure_one(entry)?;
            }
        }

        let router_context = RouterContext::new(
            execution,
            blocks
                .iter()
                .map(|(block_id, block)| (block_id.clone(), block.clone()))
                .collect::<HashMap<_, _>>(),
        )
        .with_settings(context.router_settings);
        router.configure(router_context)?;

        self.id = id;
        self.properties = Some(bag);
        self.blocks = blocks;
        self.router = Some(router);
        self.authorizer = context.authorizer;
        self.parallel_lifecycle = context.parallel_lifecycle;
        Ok(())
    }

    /// Starts the router, then every block in declaration order. A block
    /// failure is logged, flags that block Error, and aborts the
    /// remaining starts.
    pub fn start(&self) -> Result<(), ServiceError> {
        self.status.set(RunnerStatus::Starting);
        match self.on_start() {
            Ok(()) => {
                self.status.set(RunnerStatus::Started);
                Ok(())
            }
            Err(e) => {
                log::error!("failed to start service: {e}");
                self.status.add(RunnerStatus::Error);
                Err(e)
            }
        }
    }

    fn on_start(&self) -> Result<(), ServiceError> {
        let router = self.router.as_ref().ok_or(ServiceError::NotConfigured)?;
        router.start()?;
        let start_one = |block: &Arc<dyn Block>| -> Result<(), ServiceError> {
            block.status().set(RunnerStatus::Starting);
            match block.start() {
                Ok(()) => {
                    block.status().set(RunnerStatus::Started);
                    Ok(())
                }
                Err(e) => {
                    log::error!("block '{}' failed to start: {e}", block.id());
                    block.status().add(RunnerStatus::Error);
                    Err(e.into())
                }
            }
        };
        if self.parallel_lifecycle {
            fan_out(self.blocks.values(), start_one)
        } else {
            for block in self.blocks.values() {
                start_one(block)?;
            }
            Ok(())
        }
    }

    /// Stops every block best-effort, then the router. Failures are
    /// logged and flagged but do not stop the sweep; the first one is
    /// returned after everything has been attempted.
    pub fn stop(&self) -> Result<(), ServiceError> {
        self.status.set(RunnerStatus::Stopping);
        let result = self.on_stop();
        self.status.set(RunnerStatus::Stopped);
        result
    }

    fn on_stop(&self) -> Result<(), ServiceError> {
        let Some(router) = self.router.as_ref() else {
            return Ok(());
        };
        // alert the router first so deliveries drain silently while
        // blocks wind down
        router.status().set(RunnerStatus::Stopping);
        let stop_one = |block: &Arc<dyn Block>| -> Result<(), ServiceError> {
            block.status().set(RunnerStatus::Stopping);
            match block.stop() {
                Ok(()) => {
                    block.status().set(RunnerStatus::Stopped);
                    Ok(())
                }
                Err(e) => {
                    log::error!("block '{}' failed to stop: {e}", block.id());
                    block.status().add(RunnerStatus::Error);
                    Err(e.into())
                }
            }
        };
        let mut first_error = None;
        if self.parallel_lifecycle {
            first_error = fan_out(self.blocks.values(), stop_one).err();
        } else {
            for block in self.blocks.values() {
                if let Err(e) = stop_one(block) {
                    first_error.get_or_insert(e);
                }
            }
        }
        router.stop();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Serialized service properties.
    pub fn to_dict(&self) -> Result<Value, ServiceError> {
        let bag = self.properties.as_ref().ok_or(ServiceError::NotConfigured)?;
        Ok(bag.to_dict())
    }

    /// The service status snapshot, for monitoring.
    pub fn heartbeat(&self) -> StatusSet {
        self.status.snapshot()
    }

    /// Service status plus the status of every block.
    pub fn full_status(&self) -> Value {
        let mut report = Map::new();
        report.insert(
            "service".into(),
            Value::String(self.status.snapshot().to_string()),
        );
        for (block_id, block) in &self.blocks {
            report.insert(
                block_id.clone(),
                Value::String(block.status().snapshot().to_string()),
            );
        }
        Value::Object(report)
    }

    /// Dispatches a command message addressed to this service or one of
    /// its blocks. Lifecycle commands pass through the authorizer.
    pub fn handle_command(
        &self,
        user: Option<&str>,
        message: &CommandMessage,
    ) -> Result<Value, ServiceError> {
        if message.is_service_level() {
            match message.command.as_str() {
                "start" => {
                    self.authorize(user, "services.start")?;
                    self.start()?;
                    Ok(Value::Null)
                }
                "stop" => {
                    self.authorize(user, "services.stop")?;
                    self.stop()?;
                    Ok(Value::Null)
                }
                "heartbeat" => Ok(Value::String(self.heartbeat().to_string())),
                "status" => Ok(self.full_status()),
                "runproperties" => self.to_dict(),
                other => Err(ServiceError::UnknownCommand(other.to_string())),
            }
        } else {
            let block_id = message.block.as_deref().unwrap_or("");
            let block = self
                .blocks
                .get(block_id)
                .ok_or_else(|| ServiceError::UnknownBlock(block_id.to_string()))?;
            match message.command.as_str() {
                "properties" => Ok(block.core().to_dict()?),
                "status" => Ok(Value::String(block.status().snapshot().to_string())),
                other => Err(ServiceError::UnknownCommand(other.to_string())),
            }
        }
    }

    fn authorize(&self, user: Option<&str>, task: &str) -> Result<(), ServiceError> {
        if let Some(authorizer) = &self.authorizer {
            authorizer.authorize(user.unwrap_or(""), task)?;
        }
        Ok(())
    }
}

impl Default for Service {
    fn default() -> Self {
        Service::new()
    }
}

/// Runs `f` for each item on its own scoped thread, returning the first
/// failure after every thread has finished.
fn fan_out<'a, T: Sync + 'a>(
    items: impl Iterator<Item = &'a T>,
    f: impl Fn(&T) -> Result<(), ServiceError> + Sync,
) -> Result<(), ServiceError> {
    let f = &f;
    let results: Vec<Result<(), ServiceError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .map(|item| scope.spawn(move || f(item)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });
    for result in results {
        result?;
    }
    Ok(())
}
