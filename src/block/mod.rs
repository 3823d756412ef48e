//! The block contract and the shared per-instance core.
//!
//! A block is a unit of processing with typed input/output terminals.
//! Implementations embed a [`BlockCore`] (exposed through
//! [`Block::core`]) and get the configure/status/terminal plumbing for
//! free; they override [`Block::process_signals`] to do their work and
//! call [`BlockCore::notify_signals`] to emit results downstream.

mod context;
mod terminals;

pub use context::BlockContext;
pub use terminals::{DEFAULT_TERMINAL, TerminalSet, TerminalSetBuilder};

use crate::modules::Persistence;
use crate::properties::{PropertyBag, PropertyError, PropertySet, PropertySpec};
use crate::router::{BlockRouter, RouterError};
use crate::signal::Signal;
use crate::status::StatusFlags;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    /// The block was used before `configure` bound its context.
    #[error("block is not configured")]
    NotConfigured,

    /// Malformed configuration input.
    #[error("invalid block configuration: {0}")]
    Configuration(String),

    /// Property failure, surfaced as-is.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Router failure raised while this block was notifying.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A failure inside a block's own processing logic.
    #[error("{0}")]
    Processing(String),
}

static BASE_PROPERTIES: Lazy<PropertySet> = Lazy::new(|| {
    PropertySet::builder()
        .property(PropertySpec::version("0.0.0"))
        .property(PropertySpec::string("id", "Id").hidden())
        .property(PropertySpec::string("type", "Type").hidden().readonly())
        .build()
});

/// The property declarations every block inherits: `version`, `id` and
/// `type`. Extend with [`PropertySet::builder`]`.extends(base_properties())`.
pub fn base_properties() -> &'static PropertySet {
    &BASE_PROPERTIES
}

struct CoreState {
    id: String,
    service_name: String,
    command_url: String,
    router: Weak<BlockRouter>,
    properties: Option<PropertyBag>,
    persistence: Option<Arc<dyn Persistence>>,
}

/// Shared per-instance state every block embeds.
pub struct BlockCore {
    status: StatusFlags,
    state: Mutex<CoreState>,
}

impl BlockCore {
    pub fn new() -> Self {
        BlockCore {
            status: StatusFlags::with_initial(crate::status::RunnerStatus::Created),
            state: Mutex::new(CoreState {
                id: String::new(),
                service_name: String::new(),
                command_url: String::new(),
                router: Weak::new(),
                properties: None,
                persistence: None,
            }),
        }
    }

    /// Binds the context and loads configuration. Called once, from
    /// [`Block::configure`].
    pub fn configure(
        &self,
        context: BlockContext,
        set: &'static PropertySet,
    ) -> Result<(), BlockError> {
        let mut bag = PropertyBag::new(set);
        bag.from_dict(&context.properties)?;
        let id = match bag.raw("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(BlockError::Configuration(
                    "block configuration must carry a non-empty 'id'".into(),
                ));
            }
        };
        let mut state = self.state.lock().unwrap();
        state.id = id;
        state.service_name = context.service_name;
        state.command_url = context.command_url;
        state.router = Arc::downgrade(&context.router);
        state.properties = Some(bag);
        state.persistence = context.persistence;
        Ok(())
    }

    pub fn id(&self) -> String {
        self.state.lock().unwrap().id.clone()
    }

    pub fn service_name(&self) -> String {
        self.state.lock().unwrap().service_name.clone()
    }

    pub fn command_url(&self) -> String {
        self.state.lock().unwrap().command_url.clone()
    }

    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    pub fn persistence(&self) -> Option<Arc<dyn Persistence>> {
        self.state.lock().unwrap().persistence.clone()
    }

    /// Resolves one property against an optional signal.
    pub fn property(&self, name: &str, signal: Option<&Signal>) -> Result<Value, BlockError> {
        let state = self.state.lock().unwrap();
        let bag = state.properties.as_ref().ok_or(BlockError::NotConfigured)?;
        Ok(bag.resolve(name, signal)?)
    }

    /// Runs a closure against the property bag, for typed reads beyond
    /// [`BlockCore::property`].
    pub fn with_properties<R>(
        &self,
        f: impl FnOnce(&PropertyBag) -> R,
    ) -> Result<R, BlockError> {
        let state = self.state.lock().unwrap();
        let bag = state.properties.as_ref().ok_or(BlockError::NotConfigured)?;
        Ok(f(bag))
    }

    /// Serializes the current raw configuration.
    pub fn to_dict(&self) -> Result<Value, BlockError> {
        self.with_properties(PropertyBag::to_dict)
    }

    /// Per-property no-signal health report.
    pub fn validate(&self) -> Result<indexmap::IndexMap<String, bool>, BlockError> {
        self.with_properties(PropertyBag::validate)
    }

    /// Emits a batch downstream on the named output terminal.
    pub fn notify_signals(&self, signals: &[Signal], output_id: &str) -> Result<(), RouterError> {
        let (router, id) = {
            let state = self.state.lock().unwrap();
            (state.router.upgrade(), state.id.clone())
        };
        match router {
            Some(router) => router.notify_signals(&id, signals, output_id),
            None => Err(RouterError::Unavailable),
        }
    }
}

impl Default for BlockCore {
    fn default() -> Self {
        BlockCore::new()
    }
}

/// The contract every block implements.
///
/// The router only ever calls [`Block::process_signals`],
/// [`Block::is_input_valid`], [`Block::is_output_valid`] and reads
/// [`Block::status`]; lifecycle methods belong to the owning service.
pub trait Block: Send + Sync {
    /// The embedded shared core.
    fn core(&self) -> &BlockCore;

    /// The terminal declarations of this block type.
    fn terminals(&self) -> &TerminalSet {
        TerminalSet::base()
    }

    /// The property declarations of this block type.
    fn properties(&self) -> &'static PropertySet {
        base_properties()
    }

    /// Binds the context. Overriders must call
    /// `self.core().configure(context, self.properties())` first.
    fn configure(&self, context: BlockContext) -> Result<(), BlockError> {
        self.core().configure(context, self.properties())
    }

    fn start(&self) -> Result<(), BlockError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Called by the router for each delivered batch.
    fn process_signals(&self, signals: &[Signal], input_id: &str) -> Result<(), BlockError> {
        let _ = (signals, input_id);
        Ok(())
    }

    fn id(&self) -> String {
        self.core().id()
    }

    fn status(&self) -> &StatusFlags {
        self.core().status()
    }

    fn is_input_valid(&self, input_id: &str) -> bool {
        self.terminals().has_input(input_id)
    }

    fn is_output_valid(&self, output_id: &str) -> bool {
        self.terminals().has_output(output_id)
    }
}
