//! Errors raised while parsing or evaluating expressions.

use thiserror::Error;

/// Any failure produced by the template scanner, the expression parser or
/// the restricted interpreter. These propagate to the caller untouched;
/// the evaluator performs no retry or suppression of its own.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    /// Malformed template or expression text.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A name that is neither a local binding, the bound signal, nor on
    /// the sandbox allow-list.
    #[error("name '{0}' is not defined")]
    Name(String),

    /// An operation applied to operands of the wrong type.
    #[error("type error: {0}")]
    Type(String),

    /// A missing field or module member.
    #[error("attribute error: {0}")]
    Attribute(String),

    /// A well-typed operation with an unusable value (bad index, division
    /// by zero, malformed pattern, ...).
    #[error("value error: {0}")]
    Value(String),

    /// The expression touched the bound signal, but no signal was
    /// supplied for this evaluation.
    #[error("evaluation requires a signal")]
    SignalRequired,
}
