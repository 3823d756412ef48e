//! The template/expression mini-language for dynamic property values.
//!
//! A template is a string with zero or more `{{ expr }}` spans. Literal
//! spans pass through; expression spans are evaluated against an optional
//! [`Signal`] inside a restricted interpreter (see [`Sandbox`]). Within a
//! span, `$name` is shorthand for a field of the bound signal and a bare
//! `$` for the whole record; `\{{`, `\}}` and `\$` escape the delimiters.
//!
//! Result composition follows the segment count: a single literal yields
//! that string, exactly one segment yields its native value (so
//! `{{ 1 + 5 }}` is the integer 6, not `"6"`), and anything longer is
//! stringified and concatenated.
//!
//! Parses are cached process-wide, keyed by the exact template text.
//! Failed parses are not cached; interpreter errors always propagate to
//! the caller untouched.

mod error;
mod interp;
mod lexer;
mod parser;
mod sandbox;

pub use error::EvalError;
pub use interp::SIGNAL_NAME;
pub use sandbox::{ModuleDef, ModuleEntry, NativeFn, Sandbox};

use crate::signal::Signal;
use interp::EvalContext;
use once_cell::sync::Lazy;
use parser::Expr;
use sandbox::stringify;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
enum Segment {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug)]
struct ParsedTemplate {
    segments: Vec<Segment>,
}

static TEMPLATE_CACHE: Lazy<Mutex<HashMap<String, Arc<ParsedTemplate>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Evaluates a raw property value, template or not.
///
/// Non-string raw values are returned unchanged; strings run through the
/// template machinery. The evaluator is cheap to construct, since the
/// parse cache does the heavy lifting across instances.
#[derive(Clone, Debug)]
pub struct Evaluator {
    expression: Value,
}

impl Evaluator {
    pub fn new(expression: Value) -> Self {
        Evaluator { expression }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Evaluator {
            expression: Value::String(text.into()),
        }
    }

    /// The raw expression, untouched by any evaluation.
    pub fn raw(&self) -> &Value {
        &self.expression
    }

    /// Evaluates against the process-wide sandbox.
    pub fn evaluate(&self, signal: Option<&Signal>) -> Result<Value, EvalError> {
        self.evaluate_with(signal, Sandbox::current())
    }

    /// Evaluates against an explicit sandbox.
    pub fn evaluate_with(
        &self,
        signal: Option<&Signal>,
        sandbox: Arc<Sandbox>,
    ) -> Result<Value, EvalError> {
        let Value::String(text) = &self.expression else {
            return Ok(self.expression.clone());
        };
        let parsed = parse_template(text)?;
        match parsed.segments.as_slice() {
            [] => Ok(Value::String(String::new())),
            [Segment::Literal(literal)] => Ok(Value::String(literal.clone())),
            [Segment::Expr(expr)] => {
                let mut ctx = EvalContext::new(signal, sandbox);
                interp::evaluate(expr, &mut ctx)
            }
            segments => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(literal) => out.push_str(literal),
                        Segment::Expr(expr) => {
                            let mut ctx = EvalContext::new(signal, sandbox.clone());
                            out.push_str(&stringify(&interp::evaluate(expr, &mut ctx)?));
                        }
                    }
                }
                Ok(Value::String(out))
            }
        }
    }
}

fn parse_template(text: &str) -> Result<Arc<ParsedTemplate>, EvalError> {
    if let Some(hit) = TEMPLATE_CACHE.lock().unwrap().get(text) {
        return Ok(hit.clone());
    }
    // parse outside the lock; a racing duplicate parse is harmless
    let parsed = Arc::new(build_template(text)?);
    TEMPLATE_CACHE
        .lock()
        .unwrap()
        .entry(text.to_string())
        .or_insert_with(|| parsed.clone());
    Ok(parsed)
}

fn build_template(text: &str) -> Result<ParsedTemplate, EvalError> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            // escape sequences stay verbatim until unescaping
            literal.push('\\');
            literal.push(chars[i + 1]);
            i += 2;
        } else if opens_span(&chars, i) {
            if !literal.is_empty() {
                segments.push(Segment::Literal(unescape(&literal)));
                literal.clear();
            }
            let (expr_text, next) = read_span(&chars, i + 2)?;
            let transformed = transform_signal_refs(&expr_text);
            segments.push(Segment::Expr(parser::parse(&unescape(&transformed))?));
            i = next;
        } else {
            literal.push(chars[i]);
            i += 1;
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(unescape(&literal)));
    }
    Ok(ParsedTemplate { segments })
}

fn opens_span(chars: &[char], i: usize) -> bool {
    chars[i] == '{' && chars.get(i + 1) == Some(&'{')
}

fn closes_span(chars: &[char], i: usize) -> bool {
    chars[i] == '}' && chars.get(i + 1) == Some(&'}')
}

/// Collects span text up to the matching `}}`, which must exist.
fn read_span(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let mut text = String::new();
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            text.push('\\');
            text.push(chars[i + 1]);
            i += 2;
        } else if closes_span(chars, i) {
            return Ok((text, i + 2));
        } else {
            text.push(chars[i]);
            i += 1;
        }
    }
    Err(EvalError::Syntax(
        "unexpected end of template while looking for '}}'".into(),
    ))
}

/// Rewrites `$name` to a field access on the bound record and a bare `$`
/// to the record itself. Escaped `\$` is left for [`unescape`].
fn transform_signal_refs(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push('\\');
            out.push(chars[i + 1]);
            i += 2;
        } else if chars[i] == '$' {
            let mut j = i + 1;
            if j < chars.len() && (chars[j].is_alphabetic() || chars[j] == '_') {
                j += 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                out.push_str(SIGNAL_NAME);
                out.push('.');
                out.extend(&chars[i + 1..j]);
            } else {
                out.push_str(SIGNAL_NAME);
            }
            i = j.max(i + 1);
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Removes the backslash from `\$`, `\{{` and `\}}`; any other backslash
/// is preserved.
fn unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            let two_char = (escaped == '{' && chars.get(i + 2) == Some(&'{'))
                || (escaped == '}' && chars.get(i + 2) == Some(&'}'));
            if escaped == '$' {
                out.push('$');
                i += 2;
                continue;
            }
            if two_char {
                out.push(escaped);
                out.push(escaped);
                i += 3;
                continue;
            }
            out.push('\\');
            out.push(escaped);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
fn cached_parse(text: &str) -> Option<Arc<ParsedTemplate>> {
    TEMPLATE_CACHE.lock().unwrap().get(text).cloned()
}
