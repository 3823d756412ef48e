//! The fixed registry of property value types.
//!
//! Every configurable property declares one of these kinds; the kind owns
//! the `serialize`/`deserialize` pair that moves values between their plain
//! (JSON) form and their validated form. Conversions are pure, stateless
//! and safe to call from any thread.
//!
//! `deserialize` fails with a [`TypeError`] naming the offending value.
//! A `Null` input passes through untouched for every kind: whether none is
//! *permitted* is the property layer's allow-none decision, not the
//! type's.

mod select;
mod timedelta;

pub use select::SelectOptions;
pub use timedelta::to_duration;

use crate::properties::PropertySet;
use serde_json::{Number, Value};
use thiserror::Error;

/// Conversion failure for a single value.
#[derive(Debug, Error)]
#[error("unable to cast value to {target}: {value}")]
pub struct TypeError {
    target: &'static str,
    value: Value,
}

impl TypeError {
    pub fn new(target: &'static str, value: &Value) -> Self {
        TypeError {
            target,
            value: value.clone(),
        }
    }

    /// The type name the value failed to convert to.
    pub fn target(&self) -> &'static str {
        self.target
    }
}

/// Schema reference for object-valued properties.
///
/// The embedded set drives recursive description and validation; when a
/// sub-type exposes no registered set, the type name stands in so the
/// description stays serializable.
#[derive(Clone, Copy, Debug)]
pub struct ObjectSchema {
    pub schema: Option<&'static PropertySet>,
    pub type_name: &'static str,
}

/// A property value type.
#[derive(Clone, Debug)]
pub enum Kind {
    Bool,
    Int,
    Float,
    String,
    File,
    TimeDelta,
    List(Box<Kind>),
    Object(ObjectSchema),
    Select(SelectOptions),
    Version,
    /// Free-form values, passed through unconverted.
    Any,
}

impl Kind {
    /// Stable type name used in serialized property descriptions.
    pub fn data_type(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "str",
            Kind::File => "file",
            Kind::TimeDelta => "timedelta",
            Kind::List(_) => "list",
            Kind::Object(_) => "object",
            Kind::Select(_) => "select",
            Kind::Version => "version",
            Kind::Any => "var",
        }
    }

    /// Converts a validated value to its plain JSON form.
    ///
    /// Values are stored in plain form already, so this is the identity
    /// for every kind; it exists so the two directions stay symmetric at
    /// call sites.
    pub fn serialize(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Converts a plain value to its validated form.
    pub fn deserialize(&self, value: &Value) -> Result<Value, TypeError> {
        // allow-none was already checked by the property layer
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Kind::Bool => deserialize_bool(value),
            Kind::Int => deserialize_int(value),
            Kind::Float => deserialize_float(value),
            Kind::String => deserialize_string(value),
            Kind::File => match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(TypeError::new("file", other)),
            },
            Kind::TimeDelta => timedelta::deserialize(value),
            Kind::List(item) => deserialize_list(item, value),
            Kind::Object(schema) => deserialize_object(schema, value),
            Kind::Select(options) => options.deserialize(value),
            Kind::Version => deserialize_version(value),
            Kind::Any => Ok(value.clone()),
        }
    }
}

fn deserialize_bool(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(TypeError::new("bool", value)),
        },
        Value::Number(number) => match number.as_f64() {
            Some(n) if n == 0.0 => Ok(Value::Bool(false)),
            Some(_) => Ok(Value::Bool(true)),
            None => Err(TypeError::new("bool", value)),
        },
        other => Err(TypeError::new("bool", other)),
    }
}

fn deserialize_int(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                Ok(Value::from(n))
            } else if let Some(n) = number.as_f64() {
                Ok(Value::from(n.trunc() as i64))
            } else {
                Err(TypeError::new("int", value))
            }
        }
        Value::Bool(b) => Ok(Value::from(if *b { 1 } else { 0 })),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| TypeError::new("int", value)),
        other => Err(TypeError::new("int", other)),
    }
}

fn deserialize_float(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| TypeError::new("float", value)),
        Value::Bool(b) => Ok(Value::from(if *b { 1.0 } else { 0.0 })),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| TypeError::new("float", value)),
        other => Err(TypeError::new("float", other)),
    }
}

fn deserialize_string(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(TypeError::new("str", other)),
    }
}

fn deserialize_list(item: &Kind, value: &Value) -> Result<Value, TypeError> {
    let Value::Array(items) = value else {
        return Err(TypeError::new("list", value));
    };
    let converted: Result<Vec<Value>, TypeError> =
        items.iter().map(|entry| item.deserialize(entry)).collect();
    Ok(Value::Array(converted?))
}

fn deserialize_object(schema: &ObjectSchema, value: &Value) -> Result<Value, TypeError> {
    let Value::Object(fields) = value else {
        return Err(TypeError::new("object", value));
    };
    let Some(set) = schema.schema else {
        // no registered sub-schema, accept any record
        return Ok(value.clone());
    };
    let mut converted = fields.clone();
    for (name, spec) in set.iter() {
        if let Some(field) = fields.get(name) {
            if field.is_null() {
                continue;
            }
            converted.insert(name.to_string(), spec.kind().deserialize(field)?);
        }
    }
    Ok(Value::Object(converted))
}

fn deserialize_version(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::String(text) if crate::properties::VersionSpec::parse(text).is_ok() => {
            Ok(value.clone())
        }
        other => Err(TypeError::new("version", other)),
    }
}
