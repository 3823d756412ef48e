//! Errors raised by the property metadata layer.

use crate::expression::EvalError;
use crate::types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropertyError {
    /// The property name is not declared on the owning set.
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// A none value reached a property that does not allow none.
    #[error("property '{property}' does not allow none")]
    AllowNoneViolation { property: String },

    /// Conversion failure from the type registry, surfaced as-is.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Expression evaluation failure, surfaced as-is.
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The configured version string does not parse.
    #[error("invalid version format: {0}")]
    InvalidVersionFormat(String),

    /// The configured version is older than the effective minimum.
    #[error("version {instance} is older than minimum version {min}")]
    OlderThanMinVersion { instance: String, min: String },

    /// `from_dict`/`validate_dict` input was not a keyed mapping.
    #[error("properties must be a keyed mapping")]
    NotAMapping,
}
