//! The command envelope: a simple RPC message addressed to a service or
//! one of its blocks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// A command to execute on a service (empty `block`) or on one of its
/// blocks, with a keyed argument mapping. No framing is specified here;
/// the envelope is plain serializable data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandMessage {
    pub id: Uuid,
    pub service: String,
    #[serde(default)]
    pub block: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl CommandMessage {
    /// A service-level command.
    pub fn service(service: impl Into<String>, command: impl Into<String>) -> Self {
        CommandMessage {
            id: Uuid::new_v4(),
            service: service.into(),
            block: None,
            command: command.into(),
            args: Map::new(),
        }
    }

    /// A block-level command.
    pub fn block(
        service: impl Into<String>,
        block: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        CommandMessage {
            block: Some(block.into()),
            ..CommandMessage::service(service, command)
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    /// Whether the command addresses the service itself.
    pub fn is_service_level(&self) -> bool {
        self.block.as_deref().unwrap_or("").is_empty()
    }
}

impl fmt::Display for CommandMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command message: service: {}, block: {}, command: {}, args: {}",
            self.service,
            self.block.as_deref().unwrap_or(""),
            self.command,
            Value::Object(self.args.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trips_through_json() {
        let message = CommandMessage::block("metrics", "counter", "properties")
            .with_arg("verbose", json!(true));
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: CommandMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, message.id);
        assert_eq!(decoded.block.as_deref(), Some("counter"));
        assert_eq!(decoded.args["verbose"], json!(true));
    }

    #[test]
    fn test_service_level_addressing() {
        assert!(CommandMessage::service("s", "start").is_service_level());
        assert!(!CommandMessage::block("s", "b", "properties").is_service_level());
    }
}
