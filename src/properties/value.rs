//! The per-instance container pairing a raw configured value with its
//! descriptor.

use super::error::PropertyError;
use super::spec::PropertySpec;
use crate::expression::Evaluator;
use crate::signal::Signal;
use serde_json::Value;

/// Wraps one property's raw configured value.
///
/// The raw form (literal or expression template) is always recoverable
/// through [`PropertyValue::raw`] no matter how many times the container
/// has been resolved; resolving never rewrites the stored value.
#[derive(Clone, Copy, Debug)]
pub struct PropertyValue<'a> {
    spec: &'a PropertySpec,
    raw: &'a Value,
}

impl<'a> PropertyValue<'a> {
    pub fn new(spec: &'a PropertySpec, raw: &'a Value) -> Self {
        PropertyValue { spec, raw }
    }

    pub fn spec(&self) -> &PropertySpec {
        self.spec
    }

    pub fn raw(&self) -> &Value {
        self.raw
    }

    /// Produces the concrete value for this property.
    ///
    /// String raw values run through the template evaluator against the
    /// optional signal; literals ignore the signal entirely. The result
    /// is then checked for allow-none and converted by the declared type.
    pub fn resolve(&self, signal: Option<&Signal>) -> Result<Value, PropertyError> {
        let evaluated = match self.raw {
            Value::String(_) => Evaluator::new(self.raw.clone()).evaluate(signal)?,
            other => other.clone(),
        };
        if evaluated.is_null() {
            if self.spec.is_allow_none() {
                return Ok(Value::Null);
            }
            return Err(PropertyError::AllowNoneViolation {
                property: self.spec.name().to_string(),
            });
        }
        Ok(self.spec.kind().deserialize(&evaluated)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_ignores_signal() {
        let spec = PropertySpec::int("count", "Count");
        let raw = json!(5);
        let value = PropertyValue::new(&spec, &raw);
        let signal = Signal::from_value(json!({"count": 99}));
        assert_eq!(value.resolve(Some(&signal)).unwrap(), json!(5));
        assert_eq!(value.resolve(None).unwrap(), json!(5));
    }

    #[test]
    fn test_expression_resolves_against_signal() {
        let spec = PropertySpec::int("count", "Count");
        let raw = json!("{{ $n + 1 }}");
        let value = PropertyValue::new(&spec, &raw);
        let signal = Signal::from_value(json!({"n": 4}));
        assert_eq!(value.resolve(Some(&signal)).unwrap(), json!(5));
        // raw form is untouched by resolution
        assert_eq!(value.raw(), &json!("{{ $n + 1 }}"));
    }

    #[test]
    fn test_allow_none_gate() {
        let strict = PropertySpec::int("count", "Count");
        let relaxed = PropertySpec::int("count", "Count").allow_none();
        let raw = Value::Null;
        assert!(matches!(
            PropertyValue::new(&strict, &raw).resolve(None),
            Err(PropertyError::AllowNoneViolation { .. })
        ));
        assert_eq!(
            PropertyValue::new(&relaxed, &raw).resolve(None).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_type_conversion_applies_to_expression_result() {
        let spec = PropertySpec::int("count", "Count");
        let raw = json!("{{ '12' }}");
        let value = PropertyValue::new(&spec, &raw);
        assert_eq!(value.resolve(None).unwrap(), json!(12));
    }
}
