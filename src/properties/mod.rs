//! Declarative, versioned, type-checked configuration fields.
//!
//! A property-bearing type assembles a [`PropertySet`] once (cached in a
//! `static`), instances carry a [`PropertyBag`] of raw values, and each
//! access resolves through a [`PropertyValue`] container, evaluating
//! `{{ }}` templates against the delivered signal at read time. See
//! [`PropertySet`] for the inheritance-composition rules and
//! [`PropertyBag`] for serialization and the version gate.

mod bag;
mod error;
mod set;
mod spec;
mod value;
mod version;

pub use bag::PropertyBag;
pub use error::PropertyError;
pub use set::{PropertySet, PropertySetBuilder};
pub use spec::PropertySpec;
pub use value::PropertyValue;
pub use version::{VersionCheck, VersionSpec};
