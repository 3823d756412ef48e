//! Keyed-value persistence contract.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("persistence operation failed: {0}")]
pub struct PersistenceError(pub String);

/// Saves and loads keyed values on behalf of a block or service.
///
/// Callers namespace their keys themselves (blocks use their own id), so
/// one store instance can back a whole service.
pub trait Persistence: Send + Sync {
    fn save(&self, key: &str, value: &Value) -> Result<(), PersistenceError>;

    fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}
