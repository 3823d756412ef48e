//! The per-instance store of raw property values.

use super::error::PropertyError;
use super::set::PropertySet;
use super::value::PropertyValue;
use super::version::{VersionCheck, VersionSpec};
use crate::signal::Signal;
use crate::types::to_duration;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::time::Duration;

/// Raw configured values for every property a set declares.
///
/// The bag holds raw (serialized) forms only; concrete values come from
/// [`PropertyBag::resolve`], which evaluates templates per signal at
/// access time.
#[derive(Clone, Debug)]
pub struct PropertyBag {
    set: &'static PropertySet,
    values: IndexMap<String, Value>,
}

impl PropertyBag {
    /// Seeds every declared property with its raw default (`Null` when a
    /// spec declares none).
    pub fn new(set: &'static PropertySet) -> Self {
        let values = set
            .iter()
            .map(|(name, spec)| {
                (
                    name.to_string(),
                    spec.default().cloned().unwrap_or(Value::Null),
                )
            })
            .collect();
        PropertyBag { set, values }
    }

    pub fn set(&self) -> &'static PropertySet {
        self.set
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The container for one property, or `None` when undeclared.
    pub fn value(&self, name: &str) -> Option<PropertyValue<'_>> {
        let spec = self.set.get(name)?;
        let raw = self.values.get(name)?;
        Some(PropertyValue::new(spec, raw))
    }

    /// Assigns a raw value programmatically.
    pub fn set_raw(&mut self, name: &str, value: Value) -> Result<(), PropertyError> {
        if !self.set.contains(name) {
            return Err(PropertyError::UnknownProperty(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolves one property to its concrete value, evaluating any
    /// expression against `signal`.
    pub fn resolve(&self, name: &str, signal: Option<&Signal>) -> Result<Value, PropertyError> {
        self.value(name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))?
            .resolve(signal)
    }

    pub fn resolve_string(
        &self,
        name: &str,
        signal: Option<&Signal>,
    ) -> Result<String, PropertyError> {
        match self.resolve(name, signal)? {
            Value::String(text) => Ok(text),
            other => Err(crate::types::TypeError::new("str", &other).into()),
        }
    }

    pub fn resolve_bool(&self, name: &str, signal: Option<&Signal>) -> Result<bool, PropertyError> {
        match self.resolve(name, signal)? {
            Value::Bool(b) => Ok(b),
            other => Err(crate::types::TypeError::new("bool", &other).into()),
        }
    }

    pub fn resolve_i64(&self, name: &str, signal: Option<&Signal>) -> Result<i64, PropertyError> {
        self.resolve(name, signal)?
            .as_i64()
            .ok_or_else(|| crate::types::TypeError::new("int", &Value::Null).into())
    }

    pub fn resolve_f64(&self, name: &str, signal: Option<&Signal>) -> Result<f64, PropertyError> {
        self.resolve(name, signal)?
            .as_f64()
            .ok_or_else(|| crate::types::TypeError::new("float", &Value::Null).into())
    }

    /// Resolves a timed-interval property into a [`Duration`].
    pub fn resolve_duration(
        &self,
        name: &str,
        signal: Option<&Signal>,
    ) -> Result<Duration, PropertyError> {
        let value = self.resolve(name, signal)?;
        to_duration(&value).ok_or_else(|| crate::types::TypeError::new("timedelta", &value).into())
    }

    /// Serializes every declared property's current raw value.
    ///
    /// Expression values serialize as their raw template text, keeping the
    /// round-trip invariant `from_dict(to_dict(bag))` lossless.
    pub fn to_dict(&self) -> Value {
        let mut out = Map::new();
        for (name, spec) in self.set.iter() {
            let raw = self.values.get(name).cloned().unwrap_or(Value::Null);
            out.insert(name.to_string(), spec.kind().serialize(&raw));
        }
        Value::Object(out)
    }

    /// Loads raw values from a plain mapping.
    ///
    /// The version gate runs first and may fail the whole call; after it
    /// passes, every declared property present in the mapping is assigned
    /// raw, unknown keys are ignored and missing keys keep their prior
    /// value. Deprecated properties log but never fail.
    pub fn from_dict(&mut self, properties: &Value) -> Result<(), PropertyError> {
        let map = properties.as_object().ok_or(PropertyError::NotAMapping)?;
        self.check_version(map)?;
        for (name, spec) in self.set.iter() {
            if let Some(value) = map.get(name) {
                if spec.is_deprecated() {
                    log::info!("property '{name}' is deprecated");
                }
                self.values.insert(name.to_string(), value.clone());
            }
        }
        Ok(())
    }

    /// Attempts a no-signal resolution of every property, reporting
    /// per-field success. A health check, not a gate: failures here may
    /// still resolve fine once a signal is present.
    pub fn validate(&self) -> IndexMap<String, bool> {
        self.set
            .iter()
            .map(|(name, _)| (name.to_string(), self.resolve(name, None).is_ok()))
            .collect()
    }

    /// The once-per-`from_dict` version gate.
    ///
    /// Missing class or instance versions only warn; a malformed instance
    /// version or one older than the effective minimum floor fails.
    fn check_version(&self, map: &Map<String, Value>) -> Result<(), PropertyError> {
        let Some(version_spec) = self.set.get("version") else {
            log::warn!("type declares no version property");
            return Ok(());
        };
        let Some(class_text) = version_spec.default().and_then(Value::as_str) else {
            log::warn!("type declares a version property with no version value");
            return Ok(());
        };
        let Ok(class_version) = VersionSpec::parse(class_text) else {
            log::warn!("declared class version is malformed: {class_text}");
            return Ok(());
        };
        let Some(instance_value) = map.get("version") else {
            log::warn!("configuration carries no version; class version is {class_text}");
            return Ok(());
        };
        let instance_text = instance_value.as_str().ok_or_else(|| {
            PropertyError::InvalidVersionFormat(instance_value.to_string())
        })?;
        let instance_version = VersionSpec::parse(instance_text)?;
        if instance_version.compare(&class_version) == VersionCheck::Older {
            let floor = match version_spec.min_version() {
                Some(text) => VersionSpec::parse(text)?,
                None => class_version.major_floor(),
            };
            if instance_version.compare(&floor) == VersionCheck::Older {
                return Err(PropertyError::OlderThanMinVersion {
                    instance: instance_text.to_string(),
                    min: floor.to_string(),
                });
            }
            log::warn!(
                "configured version {instance_text} is older than class version \
                 {class_text} but within minimum {floor}"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PropertySpec;
    use once_cell::sync::Lazy;
    use serde_json::json;

    static VERSIONED: Lazy<PropertySet> = Lazy::new(|| {
        PropertySet::builder()
            .property(PropertySpec::version("1.1.1"))
            .property(PropertySpec::int("count", "Count").with_default(json!(1)))
            .build()
    });

    static MIN_VERSIONED: Lazy<PropertySet> = Lazy::new(|| {
        PropertySet::builder()
            .property(PropertySpec::version("2.2.2").with_min_version("1.1.1"))
            .build()
    });

    static UNVERSIONED: Lazy<PropertySet> = Lazy::new(|| {
        PropertySet::builder()
            .property(PropertySpec::string("label", "Label").with_default(json!("x")))
            .build()
    });

    #[test]
    fn test_defaults_seed_values() {
        let bag = PropertyBag::new(&VERSIONED);
        assert_eq!(bag.resolve("count", None).unwrap(), json!(1));
        assert_eq!(bag.raw("version"), Some(&json!("1.1.1")));
    }

    #[test]
    fn test_set_raw_rejects_undeclared_names() {
        let mut bag = PropertyBag::new(&VERSIONED);
        bag.set_raw("count", json!(9)).unwrap();
        assert_eq!(bag.resolve("count", None).unwrap(), json!(9));
        assert!(matches!(
            bag.set_raw("mystery", json!(1)),
            Err(PropertyError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_from_dict_assigns_known_keeps_missing_ignores_unknown() {
        let mut bag = PropertyBag::new(&VERSIONED);
        bag.from_dict(&json!({"count": 7, "unknown": true})).unwrap();
        assert_eq!(bag.resolve("count", None).unwrap(), json!(7));
        assert_eq!(bag.raw("unknown"), None);

        bag.from_dict(&json!({})).unwrap();
        assert_eq!(bag.resolve("count", None).unwrap(), json!(7));
    }

    #[test]
    fn test_round_trip() {
        let mut bag = PropertyBag::new(&VERSIONED);
        bag.from_dict(&json!({"version": "1.4.1", "count": "{{ $n }}"}))
            .unwrap();
        let serialized = bag.to_dict();
        assert_eq!(
            serialized,
            json!({"version": "1.4.1", "count": "{{ $n }}"})
        );

        let mut restored = PropertyBag::new(&VERSIONED);
        restored.from_dict(&serialized).unwrap();
        assert_eq!(restored.to_dict(), serialized);
    }

    #[test]
    fn test_version_gate_outcomes() {
        // equal and newer pass
        for version in ["1.1.1", "1.2.0", "2.0.0"] {
            let mut bag = PropertyBag::new(&VERSIONED);
            assert!(bag.from_dict(&json!({"version": version})).is_ok());
        }
        // older than class but at/above the implicit major floor passes
        let mut bag = PropertyBag::new(&VERSIONED);
        assert!(bag.from_dict(&json!({"version": "1.0.0"})).is_ok());
        // below the implicit floor fails
        let mut bag = PropertyBag::new(&VERSIONED);
        assert!(matches!(
            bag.from_dict(&json!({"version": "0.9.9"})),
            Err(PropertyError::OlderThanMinVersion { .. })
        ));
        // malformed fails hard
        let mut bag = PropertyBag::new(&VERSIONED);
        assert!(matches!(
            bag.from_dict(&json!({"version": "1.k.3"})),
            Err(PropertyError::InvalidVersionFormat(_))
        ));
    }

    #[test]
    fn test_explicit_min_version_floor() {
        let mut bag = PropertyBag::new(&MIN_VERSIONED);
        assert!(bag.from_dict(&json!({"version": "1.1.1"})).is_ok());
        assert!(bag.from_dict(&json!({"version": "1.5.0"})).is_ok());
        assert!(matches!(
            bag.from_dict(&json!({"version": "1.1.0"})),
            Err(PropertyError::OlderThanMinVersion { .. })
        ));
    }

    #[test]
    fn test_missing_versions_only_warn() {
        // instance without version
        let mut bag = PropertyBag::new(&VERSIONED);
        assert!(bag.from_dict(&json!({"count": 2})).is_ok());
        // class without version property
        let mut bag = PropertyBag::new(&UNVERSIONED);
        assert!(bag.from_dict(&json!({"label": "y", "version": "9.9.9"})).is_ok());
    }

    #[test]
    fn test_validate_reports_per_field() {
        let mut bag = PropertyBag::new(&VERSIONED);
        bag.from_dict(&json!({"count": "{{ $n }}"})).unwrap();
        let report = bag.validate();
        assert_eq!(report.get("version"), Some(&true));
        // needs a signal, so the no-signal health check reports false
        assert_eq!(report.get("count"), Some(&false));
    }
}
