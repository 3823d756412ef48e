//! Declarative properties on blocks: defaults, expressions, nesting and
//! schema descriptions.

use aqueduct::prelude::*;
use aqueduct::{PropertyError, SelectOptions};
use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::Arc;

/// The nested record type held by `SensorBlock::thresholds`.
static THRESHOLDS: Lazy<PropertySet> = Lazy::new(|| {
    PropertySet::builder()
        .property(PropertySpec::float("low", "Low").with_default(json!(0.0)))
        .property(PropertySpec::float("high", "High").with_default(json!(1.0)))
        .build()
});

static SENSOR_PROPERTIES: Lazy<PropertySet> = Lazy::new(|| {
    PropertySet::builder()
        .extends(base_properties())
        .property(PropertySpec::version("1.2.0"))
        .property(
            PropertySpec::string("label", "Label").with_default(json!("Default to {{$v1}}")),
        )
        .property(
            PropertySpec::object("thresholds", "Thresholds", "Thresholds", Some(&THRESHOLDS))
                .with_default(json!({"low": 0.0, "high": 1.0})),
        )
        .property(
            PropertySpec::list("channels", "Channels", Kind::Int).with_default(json!([0])),
        )
        .property(
            PropertySpec::select(
                "mode",
                "Mode",
                SelectOptions::new()
                    .option("passive", json!(0))
                    .option("active", json!(1)),
            )
            .with_default(json!("passive")),
        )
        .property(
            PropertySpec::timedelta("interval", "Interval")
                .with_default(json!({"seconds": 30})),
        )
        .property(PropertySpec::int("threshold", "Threshold").allow_none())
        .build()
});

#[derive(Default)]
struct SensorBlock {
    core: BlockCore,
}

impl Block for SensorBlock {
    fn core(&self) -> &BlockCore {
        &self.core
    }

    fn properties(&self) -> &'static PropertySet {
        &SENSOR_PROPERTIES
    }
}

fn configured(properties: serde_json::Value) -> Arc<SensorBlock> {
    let router = Arc::new(BlockRouter::new());
    let block = Arc::new(SensorBlock::default());
    block
        .configure(BlockContext::new(router, properties))
        .unwrap();
    block
}

#[test]
fn test_default_expression_evaluates_per_signal() {
    let block = configured(json!({"id": "sensor"}));
    let signal = Signal::from_value(json!({"v1": "values"}));
    assert_eq!(
        block.core().property("label", Some(&signal)).unwrap(),
        json!("Default to values")
    );
}

#[test]
fn test_configured_expression_and_raw_recovery() {
    let block = configured(json!({"id": "sensor", "label": "{{ $name }}!"}));
    let signal = Signal::from_value(json!({"name": "probe"}));
    assert_eq!(
        block.core().property("label", Some(&signal)).unwrap(),
        json!("probe!")
    );
    // serialization returns the raw template, not an evaluation
    let serialized = block.core().to_dict().unwrap();
    assert_eq!(serialized["label"], json!("{{ $name }}!"));
    assert_eq!(serialized["id"], json!("sensor"));
}

#[test]
fn test_nested_object_property() {
    let block = configured(json!({
        "id": "sensor",
        "thresholds": {"low": "0.25", "high": 0.75}
    }));
    // nested fields convert through the sub-schema
    assert_eq!(
        block.core().property("thresholds", None).unwrap(),
        json!({"low": 0.25, "high": 0.75})
    );
}

#[test]
fn test_list_property_with_expression_default() {
    let block = configured(json!({"id": "sensor", "channels": "{{ range(3) }}"}));
    assert_eq!(
        block.core().property("channels", None).unwrap(),
        json!([0, 1, 2])
    );
}

#[test]
fn test_select_and_timedelta_properties() {
    let block = configured(json!({
        "id": "sensor",
        "mode": "active",
        "interval": {"seconds": 90}
    }));
    assert_eq!(block.core().property("mode", None).unwrap(), json!(1));
    let interval = block
        .core()
        .with_properties(|bag| bag.resolve_duration("interval", None))
        .unwrap()
        .unwrap();
    assert_eq!(interval, std::time::Duration::from_secs(90));
}

#[test]
fn test_allow_none_and_validation() {
    let block = configured(json!({"id": "sensor"}));
    // threshold allows none and was never configured
    assert_eq!(block.core().property("threshold", None).unwrap(), json!(null));
    let report = block.core().validate().unwrap();
    assert_eq!(report.get("threshold"), Some(&true));
    // the default label needs a signal, so the health check reports false
    assert_eq!(report.get("label"), Some(&false));
}

#[test]
fn test_version_gate_applies_at_configure_time() {
    let router = Arc::new(BlockRouter::new());
    let block = SensorBlock::default();
    let result = block.configure(BlockContext::new(
        router,
        json!({"id": "sensor", "version": "0.5.0"}),
    ));
    assert!(matches!(
        result,
        Err(BlockError::Property(PropertyError::OlderThanMinVersion { .. }))
    ));
}

#[test]
fn test_description_schema_is_json_encodable_and_recursive() {
    let description = SENSOR_PROPERTIES.description();
    // the whole schema must survive a JSON round trip
    let encoded = serde_json::to_string(&description).unwrap();
    let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();

    assert_eq!(decoded["label"]["type"], json!("str"));
    assert_eq!(decoded["mode"]["options"], json!({"passive": 0, "active": 1}));
    assert_eq!(decoded["version"]["default"], json!("1.2.0"));
    // object properties embed the nested schema
    assert_eq!(
        decoded["thresholds"]["template"]["low"]["type"],
        json!("float")
    );
    // inherited base declarations are present exactly once
    assert_eq!(decoded["id"]["type"], json!("str"));
}

#[test]
fn test_opaque_object_falls_back_to_type_name() {
    let spec = PropertySpec::object("extra", "Extra", "ExtraSettings", None);
    let description = spec.description();
    assert_eq!(description["template"], json!("ExtraSettings"));
}

#[test]
fn test_validate_dict_normalizes_and_rejects() {
    let set: &PropertySet = &SENSOR_PROPERTIES;
    let validated = set
        .validate_dict(&json!({"channels": [1, 2], "mode": "active"}))
        .unwrap();
    assert_eq!(validated["channels"], json!([1, 2]));

    assert!(matches!(
        set.validate_dict(&json!({"channels": "not-a-template-or-list"})),
        Err(PropertyError::Evaluation(_)) | Err(PropertyError::Type(_))
    ));
}
