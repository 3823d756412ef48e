//! Router error taxonomy.
//!
//! Build-phase members (`MissingBlock`, `InvalidBlockInput`,
//! `InvalidBlockOutput`, `MalformedReceivers`) abort graph construction;
//! delivery-phase members surface from `notify_signals`. Receiver-side
//! failures pass through the `Receiver` variant transparently; the
//! router adds no wrapping of its own.

use crate::block::BlockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    /// `notify_signals` was called in a phase that is neither started nor
    /// a silent-discard phase (stopping/stopped).
    #[error("block router is not started")]
    NotStarted,

    /// The router was started or notified before `configure` built the
    /// routing table.
    #[error("block router has not been configured")]
    NotConfigured,

    /// `configure` was called on an already-configured router.
    #[error("block router is already configured")]
    AlreadyConfigured,

    /// A block id in the execution spec resolved to no registered block.
    #[error("missing block: {0}")]
    MissingBlock(String),

    /// A receiver entry referenced an input its block does not declare.
    #[error("invalid input '{input}' for block '{block}'")]
    InvalidBlockInput { block: String, input: String },

    /// An execution entry referenced an output its sender does not
    /// declare (including a non-empty flat receiver list for a sender
    /// with no default output).
    #[error("invalid output '{output}' for block '{block}'")]
    InvalidBlockOutput { block: String, output: String },

    /// A batch item violated the signal contract; nothing was delivered.
    #[error("all delivered items must be record signals, got: {0}")]
    InvalidSignal(String),

    /// The router handle held by a block is gone.
    #[error("block router handle is no longer available")]
    Unavailable,

    /// A receiver's processing call failed; surfaced as-is.
    #[error(transparent)]
    Receiver(Box<BlockError>),
}

impl From<BlockError> for RouterError {
    fn from(e: BlockError) -> Self {
        RouterError::Receiver(Box::new(e))
    }
}
