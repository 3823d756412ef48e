//! The restricted execution environment for expressions.
//!
//! Expressions can only reach three kinds of names: the bound signal, an
//! allow-listed builtin function, and an allow-listed module. The active
//! [`Sandbox`] is process-wide and swappable; swapping is a setup-time
//! operation and is not synchronized against in-flight evaluations.

use super::error::EvalError;
use chrono::{Local, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rand::Rng;
use serde_json::{Number, Value};
use std::sync::{Arc, RwLock};

/// A function callable from inside an expression.
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// A member of an allow-listed module.
#[derive(Clone)]
pub enum ModuleEntry {
    Func(NativeFn),
    Const(Value),
}

/// A named namespace of functions and constants.
#[derive(Clone)]
pub struct ModuleDef {
    name: String,
    entries: IndexMap<String, ModuleEntry>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleDef {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    pub fn func(mut self, name: impl Into<String>, f: NativeFn) -> Self {
        self.entries.insert(name.into(), ModuleEntry::Func(f));
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), ModuleEntry::Const(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.entries.get(name)
    }
}

/// The allow-list tables visible to expressions.
pub struct Sandbox {
    builtins: IndexMap<String, NativeFn>,
    modules: IndexMap<String, Arc<ModuleDef>>,
}

static ACTIVE: Lazy<RwLock<Arc<Sandbox>>> =
    Lazy::new(|| RwLock::new(Arc::new(Sandbox::with_defaults())));

impl Sandbox {
    /// A sandbox with no reachable names at all.
    pub fn empty() -> Self {
        Sandbox {
            builtins: IndexMap::new(),
            modules: IndexMap::new(),
        }
    }

    /// The default allow-list: the builtin function table plus the
    /// `datetime`, `json`, `math`, `random` and `re` modules.
    pub fn with_defaults() -> Self {
        let mut sandbox = Sandbox::empty();
        for (name, f) in BUILTINS {
            sandbox.add_builtin(*name, *f);
        }
        sandbox.add_module(datetime_module());
        sandbox.add_module(json_module());
        sandbox.add_module(math_module());
        sandbox.add_module(random_module());
        sandbox.add_module(re_module());
        sandbox
    }

    pub fn add_builtin(&mut self, name: impl Into<String>, f: NativeFn) {
        self.builtins.insert(name.into(), f);
    }

    pub fn add_module(&mut self, module: ModuleDef) {
        self.modules
            .insert(module.name.clone(), Arc::new(module));
    }

    /// Restricts the module allow-list to the named subset.
    pub fn retain_modules(&mut self, names: &[&str]) {
        self.modules.retain(|name, _| names.contains(&name.as_str()));
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<NativeFn> {
        self.builtins.get(name).copied()
    }

    pub(crate) fn module(&self, name: &str) -> Option<Arc<ModuleDef>> {
        self.modules.get(name).cloned()
    }

    /// The sandbox in effect for new evaluations.
    pub fn current() -> Arc<Sandbox> {
        ACTIVE.read().unwrap().clone()
    }

    /// Replaces the process-wide sandbox. Treat as a stop-the-world setup
    /// operation: evaluations already holding the old table finish on it.
    pub fn install(sandbox: Sandbox) {
        *ACTIVE.write().unwrap() = Arc::new(sandbox);
    }

    /// Restores the default allow-list.
    pub fn reset() {
        Sandbox::install(Sandbox::with_defaults());
    }
}

// ---- builtin functions ----

const BUILTINS: &[(&str, NativeFn)] = &[
    ("abs", builtin_abs),
    ("all", builtin_all),
    ("any", builtin_any),
    ("bool", builtin_bool),
    ("float", builtin_float),
    ("int", builtin_int),
    ("len", builtin_len),
    ("list", builtin_list),
    ("max", builtin_max),
    ("min", builtin_min),
    ("range", builtin_range),
    ("round", builtin_round),
    ("sorted", builtin_sorted),
    ("str", builtin_str),
    ("sum", builtin_sum),
];

/// Python-style truthiness over JSON values.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Strings render bare; everything else renders as JSON.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::Type(format!(
            "{name}() takes {min} to {max} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| EvalError::Type(format!("{name}() expects a number, got {value}")))
}

fn float_value(n: f64) -> Result<Value, EvalError> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| EvalError::Value(format!("result is not a finite number: {n}")))
}

fn builtin_abs(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("abs", args, 1, 1)?;
    match &args[0] {
        Value::Number(n) if n.is_i64() => Ok(Value::from(n.as_i64().unwrap().abs())),
        other => float_value(number("abs", other)?.abs()),
    }
}

fn builtin_all(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("all", args, 1, 1)?;
    let items = args[0]
        .as_array()
        .ok_or_else(|| EvalError::Type("all() expects a list".into()))?;
    Ok(Value::Bool(items.iter().all(truthy)))
}

fn builtin_any(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("any", args, 1, 1)?;
    let items = args[0]
        .as_array()
        .ok_or_else(|| EvalError::Type("any() expects a list".into()))?;
    Ok(Value::Bool(items.iter().any(truthy)))
}

fn builtin_bool(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().map(truthy).unwrap_or(false)))
}

fn builtin_float(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("float", args, 1, 1)?;
    crate::types::Kind::Float
        .deserialize(&args[0])
        .map_err(|e| EvalError::Type(e.to_string()))
}

fn builtin_int(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("int", args, 1, 1)?;
    crate::types::Kind::Int
        .deserialize(&args[0])
        .map_err(|e| EvalError::Type(e.to_string()))
}

fn builtin_len(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("len", args, 1, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        other => {
            return Err(EvalError::Type(format!("object has no length: {other}")));
        }
    };
    Ok(Value::from(len))
}

fn builtin_list(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("list", args, 0, 1)?;
    let value = match args.first() {
        None => Value::Array(Vec::new()),
        Some(Value::Array(items)) => Value::Array(items.clone()),
        Some(Value::Object(fields)) => {
            Value::Array(fields.keys().map(|k| Value::String(k.clone())).collect())
        }
        Some(Value::String(text)) => Value::Array(
            text.chars()
                .map(|c| Value::String(c.to_string()))
                .collect(),
        ),
        Some(other) => {
            return Err(EvalError::Type(format!("object is not iterable: {other}")));
        }
    };
    Ok(value)
}

fn extremum(name: &str, args: &[Value], pick_greater: bool) -> Result<Value, EvalError> {
    let items: Vec<Value> = match args {
        [Value::Array(items)] => items.clone(),
        [] => return Err(EvalError::Type(format!("{name}() expects arguments"))),
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                let greater = super::interp::compare_order(&item, &current)?
                    == std::cmp::Ordering::Greater;
                if greater == pick_greater { item } else { current }
            }
        });
    }
    best.ok_or_else(|| EvalError::Value(format!("{name}() of an empty sequence")))
}

fn builtin_max(args: &[Value]) -> Result<Value, EvalError> {
    extremum("max", args, true)
}

fn builtin_min(args: &[Value]) -> Result<Value, EvalError> {
    extremum("min", args, false)
}

fn builtin_range(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("range", args, 1, 3)?;
    let int_arg = |v: &Value| {
        v.as_i64()
            .ok_or_else(|| EvalError::Type(format!("range() expects integers, got {v}")))
    };
    let (start, stop, step) = match args {
        [stop] => (0, int_arg(stop)?, 1),
        [start, stop] => (int_arg(start)?, int_arg(stop)?, 1),
        [start, stop, step] => (int_arg(start)?, int_arg(stop)?, int_arg(step)?),
        _ => unreachable!(),
    };
    if step == 0 {
        return Err(EvalError::Value("range() step must not be zero".into()));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::from(current));
        current += step;
    }
    Ok(Value::Array(items))
}

fn builtin_round(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("round", args, 1, 2)?;
    let n = number("round", &args[0])?;
    let digits = match args.get(1) {
        Some(d) => d
            .as_i64()
            .ok_or_else(|| EvalError::Type("round() digits must be an integer".into()))?,
        None => 0,
    };
    let factor = 10f64.powi(digits as i32);
    let rounded = (n * factor).round() / factor;
    if digits <= 0 {
        Ok(Value::from(rounded as i64))
    } else {
        float_value(rounded)
    }
}

fn builtin_sorted(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("sorted", args, 1, 1)?;
    let mut items = args[0]
        .as_array()
        .ok_or_else(|| EvalError::Type("sorted() expects a list".into()))?
        .clone();
    let mut failure = None;
    items.sort_by(|a, b| match super::interp::compare_order(a, b) {
        Ok(order) => order,
        Err(e) => {
            failure.get_or_insert(e);
            std::cmp::Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::Array(items)),
    }
}

fn builtin_str(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("str", args, 0, 1)?;
    Ok(Value::String(
        args.first().map(stringify).unwrap_or_default(),
    ))
}

fn builtin_sum(args: &[Value]) -> Result<Value, EvalError> {
    expect_args("sum", args, 1, 1)?;
    let items = args[0]
        .as_array()
        .ok_or_else(|| EvalError::Type("sum() expects a list".into()))?;
    if items.iter().all(|item| item.is_i64()) {
        return Ok(Value::from(
            items.iter().filter_map(Value::as_i64).sum::<i64>(),
        ));
    }
    let mut total = 0.0;
    for item in items {
        total += number("sum", item)?;
    }
    float_value(total)
}

// ---- default modules ----

fn datetime_module() -> ModuleDef {
    ModuleDef::new("datetime")
        .func("now", |args| {
            expect_args("now", args, 0, 0)?;
            Ok(Value::String(Local::now().to_rfc3339()))
        })
        .func("utcnow", |args| {
            expect_args("utcnow", args, 0, 0)?;
            Ok(Value::String(Utc::now().to_rfc3339()))
        })
        .func("timestamp", |args| {
            expect_args("timestamp", args, 0, 0)?;
            float_value(Utc::now().timestamp_millis() as f64 / 1000.0)
        })
}

fn json_module() -> ModuleDef {
    ModuleDef::new("json")
        .func("dumps", |args| {
            expect_args("dumps", args, 1, 1)?;
            serde_json::to_string(&args[0])
                .map(Value::String)
                .map_err(|e| EvalError::Value(e.to_string()))
        })
        .func("loads", |args| {
            expect_args("loads", args, 1, 1)?;
            let text = args[0]
                .as_str()
                .ok_or_else(|| EvalError::Type("loads() expects a string".into()))?;
            serde_json::from_str(text).map_err(|e| EvalError::Value(e.to_string()))
        })
}

fn math_module() -> ModuleDef {
    ModuleDef::new("math")
        .constant("pi", Value::from(std::f64::consts::PI))
        .constant("e", Value::from(std::f64::consts::E))
        .func("ceil", |args| {
            expect_args("ceil", args, 1, 1)?;
            Ok(Value::from(number("ceil", &args[0])?.ceil() as i64))
        })
        .func("floor", |args| {
            expect_args("floor", args, 1, 1)?;
            Ok(Value::from(number("floor", &args[0])?.floor() as i64))
        })
        .func("fabs", |args| {
            expect_args("fabs", args, 1, 1)?;
            float_value(number("fabs", &args[0])?.abs())
        })
        .func("sqrt", |args| {
            expect_args("sqrt", args, 1, 1)?;
            let n = number("sqrt", &args[0])?;
            if n < 0.0 {
                return Err(EvalError::Value("math domain error".into()));
            }
            float_value(n.sqrt())
        })
        .func("pow", |args| {
            expect_args("pow", args, 2, 2)?;
            float_value(number("pow", &args[0])?.powf(number("pow", &args[1])?))
        })
        .func("log", |args| {
            expect_args("log", args, 1, 2)?;
            let n = number("log", &args[0])?;
            if n <= 0.0 {
                return Err(EvalError::Value("math domain error".into()));
            }
            match args.get(1) {
                Some(base) => float_value(n.log(number("log", base)?)),
                None => float_value(n.ln()),
            }
        })
        .func("exp", |args| {
            expect_args("exp", args, 1, 1)?;
            float_value(number("exp", &args[0])?.exp())
        })
}

fn random_module() -> ModuleDef {
    ModuleDef::new("random")
        .func("random", |args| {
            expect_args("random", args, 0, 0)?;
            float_value(rand::thread_rng().r#gen::<f64>())
        })
        .func("randint", |args| {
            expect_args("randint", args, 2, 2)?;
            let (a, b) = int_pair("randint", args)?;
            if a > b {
                return Err(EvalError::Value("empty range for randint()".into()));
            }
            Ok(Value::from(rand::thread_rng().gen_range(a..=b)))
        })
        .func("randrange", |args| {
            expect_args("randrange", args, 2, 2)?;
            let (a, b) = int_pair("randrange", args)?;
            if a >= b {
                return Err(EvalError::Value("empty range for randrange()".into()));
            }
            Ok(Value::from(rand::thread_rng().gen_range(a..b)))
        })
        .func("choice", |args| {
            expect_args("choice", args, 1, 1)?;
            let items = args[0]
                .as_array()
                .ok_or_else(|| EvalError::Type("choice() expects a list".into()))?;
            if items.is_empty() {
                return Err(EvalError::Value("choice() of an empty sequence".into()));
            }
            Ok(items[rand::thread_rng().gen_range(0..items.len())].clone())
        })
}

fn int_pair(name: &str, args: &[Value]) -> Result<(i64, i64), EvalError> {
    let int_arg = |v: &Value| {
        v.as_i64()
            .ok_or_else(|| EvalError::Type(format!("{name}() expects integers")))
    };
    Ok((int_arg(&args[0])?, int_arg(&args[1])?))
}

fn re_module() -> ModuleDef {
    ModuleDef::new("re")
        .func("matches", |args| {
            let (pattern, text) = re_args("matches", args)?;
            Ok(Value::Bool(pattern.is_match(&text)))
        })
        .func("find", |args| {
            let (pattern, text) = re_args("find", args)?;
            Ok(pattern
                .find(&text)
                .map(|m| Value::String(m.as_str().to_string()))
                .unwrap_or(Value::Null))
        })
        .func("findall", |args| {
            let (pattern, text) = re_args("findall", args)?;
            Ok(Value::Array(
                pattern
                    .find_iter(&text)
                    .map(|m| Value::String(m.as_str().to_string()))
                    .collect(),
            ))
        })
        .func("replace", |args| {
            expect_args("replace", args, 3, 3)?;
            let (pattern, text) = re_args("replace", &args[..2])?;
            let replacement = args[2]
                .as_str()
                .ok_or_else(|| EvalError::Type("replace() expects string arguments".into()))?;
            Ok(Value::String(
                pattern.replace_all(&text, replacement).into_owned(),
            ))
        })
        .func("split", |args| {
            let (pattern, text) = re_args("split", args)?;
            Ok(Value::Array(
                pattern
                    .split(&text)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        })
}

fn re_args(name: &str, args: &[Value]) -> Result<(regex::Regex, String), EvalError> {
    if args.len() != 2 {
        return Err(EvalError::Type(format!("{name}() expects 2 arguments")));
    }
    let pattern = args[0]
        .as_str()
        .ok_or_else(|| EvalError::Type(format!("{name}() expects a string pattern")))?;
    let text = args[1]
        .as_str()
        .ok_or_else(|| EvalError::Type(format!("{name}() expects string text")))?;
    let compiled =
        regex::Regex::new(pattern).map_err(|e| EvalError::Value(format!("invalid pattern: {e}")))?;
    Ok((compiled, text.to_string()))
}
