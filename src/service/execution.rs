//! The wiring specification: who sends to whom.
//!
//! Loaded from plain JSON service configuration. A receiver spec is
//! either a flat list (targets the sender's default output) or a mapping
//! from output id to receivers; each receiver is either a bare block id
//! (targets that block's default input) or an explicit `{id, input}`
//! pair.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sender and its receivers within the execution graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockExecution {
    pub id: String,
    #[serde(default)]
    pub receivers: ReceiverSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReceiverSpec {
    /// Flat list targeting the sender's default output. An empty list is
    /// an accepted no-op wiring for any sender.
    List(Vec<ReceiverRef>),
    /// Per-output receiver lists, in declaration order.
    ByOutput(IndexMap<String, Vec<ReceiverRef>>),
}

impl Default for ReceiverSpec {
    fn default() -> Self {
        ReceiverSpec::List(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReceiverRef {
    /// Bare block id, targeting the receiver's default input.
    Id(String),
    /// Explicit input terminal on the receiving block.
    WithInput { id: String, input: String },
}

/// Parses the `execution` property value of a service configuration.
pub fn execution_from_value(value: &Value) -> Result<Vec<BlockExecution>, serde_json::Error> {
    serde_json::from_value(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_list_format() {
        let parsed = execution_from_value(&json!([
            {"id": "sim", "receivers": ["log1", "log2"]}
        ]))
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "sim");
        assert_eq!(
            parsed[0].receivers,
            ReceiverSpec::List(vec![
                ReceiverRef::Id("log1".into()),
                ReceiverRef::Id("log2".into()),
            ])
        );
    }

    #[test]
    fn test_by_output_format_with_explicit_inputs() {
        let parsed = execution_from_value(&json!([
            {
                "id": "three_outputs",
                "receivers": {
                    "0": [{"id": "state", "input": "0"}, "log1"],
                    "1": [{"id": "state", "input": "1"}],
                    "2": ["log2"]
                }
            }
        ]))
        .unwrap();
        let ReceiverSpec::ByOutput(by_output) = &parsed[0].receivers else {
            panic!("expected per-output receivers");
        };
        let outputs: Vec<&str> = by_output.keys().map(String::as_str).collect();
        assert_eq!(outputs, vec!["0", "1", "2"]);
        assert_eq!(
            by_output["0"][0],
            ReceiverRef::WithInput {
                id: "state".into(),
                input: "0".into(),
            }
        );
        assert_eq!(by_output["0"][1], ReceiverRef::Id("log1".into()));
    }

    #[test]
    fn test_missing_receivers_default_to_empty_list() {
        let parsed = execution_from_value(&json!([{"id": "lonely"}])).unwrap();
        assert_eq!(parsed[0].receivers, ReceiverSpec::List(Vec::new()));
    }

    #[test]
    fn test_round_trips_through_json() {
        let original = json!([
            {"id": "a", "receivers": ["b"]},
            {"id": "b", "receivers": {"default": [{"id": "c", "input": "default"}]}}
        ]);
        let parsed = execution_from_value(&original).unwrap();
        let serialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(serialized, original);
    }
}
