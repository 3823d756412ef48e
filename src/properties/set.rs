//! Declaration-ordered property tables, built once per type.
//!
//! This replaces reflective descriptor discovery with an explicit
//! registration table: a type assembles its set with the builder,
//! composing inherited declarations through [`PropertySetBuilder::extends`]
//! (most-derived declaration wins on a name collision), and caches the
//! result in a `static`.

use super::error::PropertyError;
use super::spec::PropertySpec;
use super::value::PropertyValue;
use crate::expression::EvalError;
use indexmap::IndexMap;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    entries: IndexMap<String, PropertySpec>,
}

impl PropertySet {
    pub fn builder() -> PropertySetBuilder {
        PropertySetBuilder {
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertySpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// The JSON-encodable schema of every declared property.
    pub fn description(&self) -> Value {
        let mut description = Map::new();
        for (name, spec) in &self.entries {
            description.insert(name.clone(), spec.description());
        }
        Value::Object(description)
    }

    /// Validates a candidate raw mapping against the declared specs
    /// without assigning it anywhere.
    ///
    /// Fails on the first type or allow-none violation; values whose
    /// expressions need a signal cannot be checked here and pass. Returns
    /// the mapping with checked values normalized to serialized form.
    pub fn validate_dict(&self, properties: &Value) -> Result<Value, PropertyError> {
        let map = properties.as_object().ok_or(PropertyError::NotAMapping)?;
        let mut normalized = map.clone();
        for (name, spec) in &self.entries {
            if let Some(raw) = map.get(name) {
                match PropertyValue::new(spec, raw).resolve(None) {
                    Ok(_) | Err(PropertyError::Evaluation(EvalError::SignalRequired)) => {}
                    Err(e) => return Err(e),
                }
                normalized.insert(name.clone(), spec.kind().serialize(raw));
            }
        }
        Ok(Value::Object(normalized))
    }
}

pub struct PropertySetBuilder {
    entries: IndexMap<String, PropertySpec>,
}

impl PropertySetBuilder {
    /// Copies every declaration from a base set. Call before declaring
    /// own properties so redeclarations override the inherited spec.
    pub fn extends(mut self, base: &PropertySet) -> Self {
        for (name, spec) in &base.entries {
            self.entries.insert(name.clone(), spec.clone());
        }
        self
    }

    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.entries.insert(spec.name().to_string(), spec);
        self
    }

    pub fn build(self) -> PropertySet {
        PropertySet {
            entries: self.entries,
        }
    }
}
