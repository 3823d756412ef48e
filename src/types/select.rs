//! Enumerated-select values: a closed table of named options.

use super::TypeError;
use indexmap::IndexMap;
use serde_json::Value;

/// The declared option table of a select property, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct SelectOptions {
    options: IndexMap<String, Value>,
}

impl SelectOptions {
    pub fn new() -> Self {
        SelectOptions::default()
    }

    /// Adds a named option. Redeclaring a name replaces its value.
    pub fn option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// Accepts either an option name or an option value, normalizing to
    /// the option value.
    pub(super) fn deserialize(&self, value: &Value) -> Result<Value, TypeError> {
        if let Value::String(name) = value {
            if let Some(selected) = self.options.get(name) {
                return Ok(selected.clone());
            }
        }
        if self.options.values().any(|candidate| candidate == value) {
            return Ok(value.clone());
        }
        Err(TypeError::new("select", value))
    }

    /// The `{name: value}` table for serialized descriptions.
    pub fn describe(&self) -> Value {
        let mut table = serde_json::Map::new();
        for (name, value) in &self.options {
            table.insert(name.clone(), value.clone());
        }
        Value::Object(table)
    }
}
