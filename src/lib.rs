//! # Aqueduct
//!
//! A composable dataflow runtime: user-authored blocks are wired into
//! directed graphs (services) and exchange keyed records (signals)
//! through a synchronous, in-process router.
//!
//! ## Features
//!
//! - **Compiled routing**: a wiring specification is validated once into
//!   an immutable dispatch table; delivery is lock-free, ordered and
//!   synchronous on the notifying thread
//! - **Declarative configuration**: typed, versioned property tables
//!   with serialization, defaults and nested composition
//! - **Dynamic values**: `{{ }}` expression templates evaluated per
//!   delivered signal inside a restricted, allow-listed interpreter
//! - **Lifecycle supervision**: configure/start/stop orchestration with
//!   set-of-flags status values and sticky warning/error states
//!
//! ## Quick Start
//!
//! ```rust
//! use aqueduct::prelude::*;
//! use aqueduct::testing::CaptureBlock;
//! use serde_json::json;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let router = Arc::new(BlockRouter::new());
//! let sender = Arc::new(CaptureBlock::new());
//! let receiver = Arc::new(CaptureBlock::new());
//! sender
//!     .configure(BlockContext::new(router.clone(), json!({"id": "sender"})))
//!     .unwrap();
//! receiver
//!     .configure(BlockContext::new(router.clone(), json!({"id": "receiver"})))
//!     .unwrap();
//!
//! let execution = execution_from_value(&json!([
//!     {"id": "sender", "receivers": ["receiver"]}
//! ]))
//! .unwrap();
//! let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
//! blocks.insert("sender".into(), sender.clone());
//! blocks.insert("receiver".into(), receiver.clone());
//!
//! router.configure(RouterContext::new(execution, blocks)).unwrap();
//! router.start().unwrap();
//!
//! let batch = vec![Signal::from_value(json!({"n": 1}))];
//! sender.core().notify_signals(&batch, DEFAULT_TERMINAL).unwrap();
//! assert_eq!(receiver.delivery_count(), 1);
//! ```
//!
//! ## Module Organization
//!
//! - [`signal`]: the keyed records flowing through a graph
//! - [`router`]: routing table construction and batch delivery
//! - [`block`] / [`service`]: the block contract and the lifecycle shell
//! - [`properties`] / [`types`]: declarative configuration metadata
//! - [`expression`]: the `{{ }}` template language and its sandbox
//! - [`status`]: set-of-flags status values
//! - [`modules`]: narrow contracts for external collaborators
//! - [`testing`]: capture blocks and in-memory stubs for tests

// ============================================================================
// Modules
// ============================================================================

pub mod block;
pub mod expression;
pub mod modules;
pub mod properties;
pub mod router;
pub mod service;
pub mod signal;
pub mod status;
pub mod testing;
pub mod types;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

pub use block::{
    Block, BlockContext, BlockCore, BlockError, DEFAULT_TERMINAL, TerminalSet,
    TerminalSetBuilder, base_properties,
};
pub use expression::{EvalError, Evaluator, ModuleDef, NativeFn, Sandbox};
pub use properties::{
    PropertyBag, PropertyError, PropertySet, PropertySetBuilder, PropertySpec, PropertyValue,
    VersionCheck, VersionSpec,
};
pub use router::{BlockRouter, RouterContext, RouterError, RouterSettings};
pub use service::{
    BlockDefinition, BlockExecution, BlockFactory, CommandMessage, ReceiverRef, ReceiverSpec,
    Service, ServiceContext, ServiceError, execution_from_value,
};
pub use signal::{Signal, SignalCloneError, clone_batch};
pub use status::{RunnerStatus, StatusFlags, StatusSet};
pub use types::{Kind, SelectOptions, TypeError};

// ============================================================================
// Prelude - Convenient Bulk Imports
// ============================================================================

/// The common imports for building blocks and services.
///
/// # Example
/// ```rust
/// use aqueduct::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        Block,
        BlockContext,
        BlockCore,
        BlockDefinition,
        BlockError,
        BlockExecution,
        // Routing
        BlockRouter,
        CommandMessage,
        DEFAULT_TERMINAL,
        Evaluator,
        Kind,
        // Properties
        PropertyBag,
        PropertySet,
        PropertySpec,
        ReceiverSpec,
        RouterContext,
        RouterError,
        RouterSettings,
        // Status
        RunnerStatus,
        // Expressions
        Sandbox,
        Service,
        ServiceContext,
        ServiceError,
        // Core data
        Signal,
        StatusFlags,
        TerminalSet,
        base_properties,
        execution_from_value,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
