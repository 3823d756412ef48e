//! Timed-interval values.
//!
//! The plain form is a record of `{days, seconds, microseconds}` integer
//! components; numeric inputs are read as (possibly fractional) seconds
//! and normalized into components.

use super::TypeError;
use serde_json::{Map, Value};
use std::time::Duration;

const COMPONENTS: [&str; 3] = ["days", "seconds", "microseconds"];

pub(super) fn deserialize(value: &Value) -> Result<Value, TypeError> {
    match value {
        Value::Object(fields) => from_components(fields, value),
        Value::Number(number) => {
            let seconds = number.as_f64().ok_or_else(|| TypeError::new("timedelta", value))?;
            if seconds < 0.0 {
                return Err(TypeError::new("timedelta", value));
            }
            let whole = seconds.trunc() as i64;
            let micros = ((seconds - seconds.trunc()) * 1_000_000.0).round() as i64;
            Ok(components(whole / 86_400, whole % 86_400, micros))
        }
        other => Err(TypeError::new("timedelta", other)),
    }
}

fn from_components(fields: &Map<String, Value>, original: &Value) -> Result<Value, TypeError> {
    for key in fields.keys() {
        if !COMPONENTS.contains(&key.as_str()) {
            return Err(TypeError::new("timedelta", original));
        }
    }
    let mut parts = [0i64; 3];
    for (slot, key) in parts.iter_mut().zip(COMPONENTS) {
        if let Some(part) = fields.get(key) {
            *slot = part
                .as_i64()
                .ok_or_else(|| TypeError::new("timedelta", original))?;
        }
    }
    Ok(components(parts[0], parts[1], parts[2]))
}

fn components(days: i64, seconds: i64, microseconds: i64) -> Value {
    let mut fields = Map::new();
    fields.insert("days".into(), Value::from(days));
    fields.insert("seconds".into(), Value::from(seconds));
    fields.insert("microseconds".into(), Value::from(microseconds));
    Value::Object(fields)
}

/// Reads a normalized timed-interval record back as a [`Duration`].
pub fn to_duration(value: &Value) -> Option<Duration> {
    let fields = value.as_object()?;
    let part = |key: &str| fields.get(key).and_then(Value::as_i64).unwrap_or(0);
    let micros = part("days") * 86_400_000_000 + part("seconds") * 1_000_000 + part("microseconds");
    u64::try_from(micros).ok().map(Duration::from_micros)
}
