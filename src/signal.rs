//! Signals: the keyed records that flow through a service graph.
//!
//! A [`Signal`] is an immutable-by-convention record of named fields carried
//! in ordered batches (`&[Signal]`). Blocks create signals, the router
//! optionally clones them for delivery isolation, and receiving blocks read
//! them. The router never mutates a signal in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error raised when a batch cannot be deep-cloned for delivery isolation.
///
/// The router recovers from this locally: on clone failure the original
/// batch is delivered instead, because losing a delivery is worse than
/// losing copy isolation.
#[derive(Debug, Error)]
#[error("unable to clone signal batch: {0}")]
pub struct SignalCloneError(#[from] serde_json::Error);

/// A free-form keyed record flowing through the graph.
///
/// The payload is a [`serde_json::Value`]. The signal *contract* requires
/// the payload to be a keyed record (a JSON object); [`Signal::from_value`]
/// does not enforce this, so the router re-checks it at the delivery
/// boundary when signal type checking is enabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal {
    value: Value,
}

impl Default for Signal {
    fn default() -> Self {
        Signal::new()
    }
}

impl Signal {
    /// Creates an empty record signal.
    pub fn new() -> Self {
        Signal {
            value: Value::Object(Map::new()),
        }
    }

    /// Creates a signal from a field map.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Signal {
            value: Value::Object(fields),
        }
    }

    /// Wraps an arbitrary value without checking the record contract.
    pub fn from_value(value: Value) -> Self {
        Signal { value }
    }

    /// Whether the payload satisfies the signal contract (keyed record).
    pub fn is_record(&self) -> bool {
        self.value.is_object()
    }

    /// Looks up a field by name. `None` for missing fields or non-record
    /// payloads.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.as_object().and_then(|map| map.get(field))
    }

    /// Sets a field, promoting a non-record payload to an empty record
    /// first.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        if !self.value.is_object() {
            self.value = Value::Object(Map::new());
        }
        if let Some(map) = self.value.as_object_mut() {
            map.insert(field.into(), value);
        }
    }

    /// The raw payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// An owned copy of the payload.
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }

    /// Deep-clones the signal through a serialization round trip.
    ///
    /// This is the explicit serializable-value clone operation the router
    /// uses for clone-on-fanout isolation; unlike `Clone::clone` it is
    /// fallible (e.g. payloads nested beyond the serializer's recursion
    /// limit), and the caller decides the fallback.
    pub fn try_deep_clone(&self) -> Result<Signal, SignalCloneError> {
        let text = serde_json::to_string(&self.value)?;
        Ok(Signal {
            value: serde_json::from_str(&text)?,
        })
    }
}

impl From<Map<String, Value>> for Signal {
    fn from(fields: Map<String, Value>) -> Self {
        Signal::from_fields(fields)
    }
}

/// Deep-clones a whole batch, failing on the first signal that cannot be
/// cloned.
pub fn clone_batch(signals: &[Signal]) -> Result<Vec<Signal>, SignalCloneError> {
    signals.iter().map(Signal::try_deep_clone).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_contract() {
        assert!(Signal::new().is_record());
        assert!(Signal::from_value(json!({"a": 1})).is_record());
        assert!(!Signal::from_value(json!(42)).is_record());
        assert!(!Signal::from_value(json!([1, 2])).is_record());
    }

    #[test]
    fn test_field_access() {
        let mut signal = Signal::from_value(json!({"a": 1}));
        assert_eq!(signal.get("a"), Some(&json!(1)));
        assert_eq!(signal.get("b"), None);
        signal.set("b", json!("two"));
        assert_eq!(signal.get("b"), Some(&json!("two")));
    }

    #[test]
    fn test_deep_clone_is_detached() {
        let signal = Signal::from_value(json!({"nested": {"a": [1, 2, 3]}}));
        let cloned = signal.try_deep_clone().unwrap();
        assert_eq!(signal, cloned);
    }

    #[test]
    fn test_deep_clone_fails_past_recursion_limit() {
        // build a payload nested deeper than the serializer allows
        let mut value = json!(1);
        for _ in 0..200 {
            value = json!([value]);
        }
        let signal = Signal::from_value(value);
        assert!(signal.try_deep_clone().is_err());
    }
}
