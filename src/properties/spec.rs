//! Property descriptors: the declarative metadata attached to a field.

use crate::types::{Kind, ObjectSchema, SelectOptions};
use serde_json::{Map, Value};

use super::set::PropertySet;

/// A single declared property: title, value type, raw default (literal or
/// template string), visibility flags and an optional minimum-version
/// floor. Specs are assembled once per type and treated as immutable.
#[derive(Clone, Debug)]
pub struct PropertySpec {
    name: String,
    title: String,
    kind: Kind,
    default: Option<Value>,
    allow_none: bool,
    visible: bool,
    readonly: bool,
    deprecated: bool,
    min_version: Option<String>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, title: impl Into<String>, kind: Kind) -> Self {
        PropertySpec {
            name: name.into(),
            title: title.into(),
            kind,
            default: None,
            allow_none: false,
            visible: true,
            readonly: false,
            deprecated: false,
            min_version: None,
        }
    }

    pub fn bool(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::Bool)
    }

    pub fn int(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::Int)
    }

    pub fn float(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::Float)
    }

    pub fn string(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::String)
    }

    pub fn file(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::File)
    }

    pub fn timedelta(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::TimeDelta)
    }

    pub fn list(name: impl Into<String>, title: impl Into<String>, item: Kind) -> Self {
        PropertySpec::new(name, title, Kind::List(Box::new(item)))
    }

    /// An object-valued property holding another property-bearing record.
    /// `schema` drives recursive description and validation; pass `None`
    /// for opaque record types, which fall back to `type_name`.
    pub fn object(
        name: impl Into<String>,
        title: impl Into<String>,
        type_name: &'static str,
        schema: Option<&'static PropertySet>,
    ) -> Self {
        PropertySpec::new(name, title, Kind::Object(ObjectSchema { schema, type_name }))
    }

    pub fn select(
        name: impl Into<String>,
        title: impl Into<String>,
        options: SelectOptions,
    ) -> Self {
        PropertySpec::new(name, title, Kind::Select(options))
    }

    /// Free-form property accepting any value unconverted.
    pub fn any(name: impl Into<String>, title: impl Into<String>) -> Self {
        PropertySpec::new(name, title, Kind::Any)
    }

    /// The class-level version property; `version` is its declared value.
    pub fn version(version: &str) -> Self {
        PropertySpec::new("version", "Version", Kind::Version)
            .with_default(Value::String(version.to_string()))
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn with_min_version(mut self, min_version: &str) -> Self {
        self.min_version = Some(min_version.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_allow_none(&self) -> bool {
        self.allow_none
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn min_version(&self) -> Option<&str> {
        self.min_version.as_deref()
    }

    /// The JSON-encodable description exposed to external tooling.
    pub fn description(&self) -> Value {
        let mut description = Map::new();
        description.insert("type".into(), Value::String(self.kind.data_type().into()));
        description.insert("title".into(), Value::String(self.title.clone()));
        description.insert(
            "default".into(),
            self.default.clone().unwrap_or(Value::Null),
        );
        description.insert("allow_none".into(), Value::Bool(self.allow_none));
        description.insert("visible".into(), Value::Bool(self.visible));
        description.insert("readonly".into(), Value::Bool(self.readonly));
        match &self.kind {
            Kind::Select(options) => {
                description.insert("options".into(), options.describe());
            }
            Kind::Object(object) => {
                // embed the sub-schema; fall back to the bare type name
                let template = match object.schema {
                    Some(set) => set.description(),
                    None => Value::String(object.type_name.to_string()),
                };
                description.insert("template".into(), template);
            }
            Kind::List(item) => {
                description.insert("list_type".into(), Value::String(item.data_type().into()));
            }
            _ => {}
        }
        if let Some(min_version) = &self.min_version {
            description.insert("min_version".into(), Value::String(min_version.clone()));
        }
        Value::Object(description)
    }
}
