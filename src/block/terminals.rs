//! Named input/output endpoints declared per block type.
//!
//! Terminal sets are fixed at type-definition time: a type assembles its
//! set once with the builder (composing an inherited set through
//! [`TerminalSetBuilder::extends`], duplicates deduplicated) and caches it
//! in a `static`. The terminal literally named [`DEFAULT_TERMINAL`] is the
//! designated default on each side.

use indexmap::IndexSet;
use once_cell::sync::Lazy;

/// The designated default terminal id.
pub const DEFAULT_TERMINAL: &str = "default";

#[derive(Clone, Debug, Default)]
pub struct TerminalSet {
    inputs: IndexSet<String>,
    outputs: IndexSet<String>,
}

static BASE: Lazy<TerminalSet> = Lazy::new(|| {
    TerminalSet::builder()
        .input(DEFAULT_TERMINAL)
        .output(DEFAULT_TERMINAL)
        .build()
});

impl TerminalSet {
    pub fn builder() -> TerminalSetBuilder {
        TerminalSetBuilder {
            set: TerminalSet::default(),
        }
    }

    /// The base declaration every plain block inherits: one default
    /// input and one default output.
    pub fn base() -> &'static TerminalSet {
        &BASE
    }

    pub fn has_input(&self, input_id: &str) -> bool {
        self.inputs.contains(input_id)
    }

    pub fn has_output(&self, output_id: &str) -> bool {
        self.outputs.contains(output_id)
    }

    /// The default input id, when one is declared.
    pub fn default_input(&self) -> Option<&str> {
        self.inputs.get(DEFAULT_TERMINAL).map(String::as_str)
    }

    /// The default output id, when one is declared.
    pub fn default_output(&self) -> Option<&str> {
        self.outputs.get(DEFAULT_TERMINAL).map(String::as_str)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(String::as_str)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(String::as_str)
    }
}

pub struct TerminalSetBuilder {
    set: TerminalSet,
}

impl TerminalSetBuilder {
    /// Copies the declarations of a base set, preserving its order.
    pub fn extends(mut self, base: &TerminalSet) -> Self {
        for input in &base.inputs {
            self.set.inputs.insert(input.clone());
        }
        for output in &base.outputs {
            self.set.outputs.insert(output.clone());
        }
        self
    }

    pub fn input(mut self, input_id: impl Into<String>) -> Self {
        self.set.inputs.insert(input_id.into());
        self
    }

    pub fn output(mut self, output_id: impl Into<String>) -> Self {
        self.set.outputs.insert(output_id.into());
        self
    }

    pub fn build(self) -> TerminalSet {
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_declares_defaults() {
        let base = TerminalSet::base();
        assert_eq!(base.default_input(), Some(DEFAULT_TERMINAL));
        assert_eq!(base.default_output(), Some(DEFAULT_TERMINAL));
    }

    #[test]
    fn test_extends_deduplicates() {
        let derived = TerminalSet::builder()
            .extends(TerminalSet::base())
            .input(DEFAULT_TERMINAL)
            .input("secondary")
            .build();
        assert_eq!(derived.inputs().count(), 2);
        assert!(derived.has_input("secondary"));
    }

    #[test]
    fn test_no_default_when_not_declared() {
        let multi = TerminalSet::builder().output("0").output("1").build();
        assert_eq!(multi.default_output(), None);
        assert!(multi.has_output("0"));
        assert!(!multi.has_output("2"));
    }
}
