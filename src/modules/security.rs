//! Authorization contract for commandable surfaces.

use thiserror::Error;

/// Raised when a user may not perform a task.
#[derive(Debug, Error)]
#[error("user '{user}' is not authorized to perform '{task}'")]
pub struct Unauthorized {
    pub user: String,
    pub task: String,
}

/// Decides whether a user can perform a named task.
pub trait Authorizer: Send + Sync {
    /// Passes when authorized; raises [`Unauthorized`] otherwise.
    fn authorize(&self, user: &str, task: &str) -> Result<(), Unauthorized>;
}
