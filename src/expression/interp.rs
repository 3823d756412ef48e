//! The restricted interpreter that executes parsed expressions.
//!
//! Evaluation walks the AST with an environment holding the optional
//! bound signal, the active sandbox tables, and comprehension-local
//! bindings. Name resolution order: locals, the signal, builtins,
//! modules. Anything else raises a name error; touching the signal name
//! with no signal bound raises the distinguished signal-required error.

use super::error::EvalError;
use super::parser::{BinaryOp, CmpOp, Expr, UnaryOp};
use super::sandbox::{ModuleDef, ModuleEntry, NativeFn, Sandbox, truthy};
use crate::signal::Signal;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// The name the input record is bound to inside expressions; the `$`
/// shorthand in templates rewrites to it.
pub const SIGNAL_NAME: &str = "signal";

pub(crate) struct EvalContext<'a> {
    signal: Option<&'a Signal>,
    sandbox: Arc<Sandbox>,
    locals: Vec<(String, Value)>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(signal: Option<&'a Signal>, sandbox: Arc<Sandbox>) -> Self {
        EvalContext {
            signal,
            sandbox,
            locals: Vec::new(),
        }
    }
}

/// What a sub-expression can resolve to. Modules and functions exist only
/// transiently, as call or attribute targets; they are not values.
enum Resolved {
    Val(Value),
    Module(Arc<ModuleDef>),
    Func(String, NativeFn),
}

impl Resolved {
    fn into_value(self) -> Result<Value, EvalError> {
        match self {
            Resolved::Val(value) => Ok(value),
            Resolved::Module(module) => Err(EvalError::Type(format!(
                "module '{}' is not a value",
                module.name()
            ))),
            Resolved::Func(name, _) => {
                Err(EvalError::Type(format!("function '{name}' is not a value")))
            }
        }
    }
}

/// Evaluates an expression to a plain value.
pub(crate) fn evaluate(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    resolve(expr, ctx)?.into_value()
}

fn resolve(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Resolved, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(Resolved::Val(value.clone())),
        Expr::Name(name) => resolve_name(name, ctx),
        Expr::List(items) => {
            let values: Result<Vec<Value>, EvalError> =
                items.iter().map(|item| evaluate(item, ctx)).collect();
            Ok(Resolved::Val(Value::Array(values?)))
        }
        Expr::Dict(entries) => {
            let mut fields = Map::new();
            for (key, value) in entries {
                fields.insert(dict_key(key, ctx)?, evaluate(value, ctx)?);
            }
            Ok(Resolved::Val(Value::Object(fields)))
        }
        Expr::Attr { target, name } => {
            let target = resolve(target, ctx)?;
            attribute(target, name)
        }
        Expr::Index { target, index } => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            index_value(&target, &index).map(Resolved::Val)
        }
        Expr::Call { target, args } => {
            let target = resolve(target, ctx)?;
            let values: Result<Vec<Value>, EvalError> =
                args.iter().map(|arg| evaluate(arg, ctx)).collect();
            match target {
                Resolved::Func(_, f) => f(&values?).map(Resolved::Val),
                Resolved::Module(module) => Err(EvalError::Type(format!(
                    "module '{}' is not callable",
                    module.name()
                ))),
                Resolved::Val(value) => {
                    Err(EvalError::Type(format!("value is not callable: {value}")))
                }
            }
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            unary(op, &value).map(Resolved::Val)
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            binary(*op, &left, &right).map(Resolved::Val)
        }
        Expr::Compare { first, rest } => {
            let mut left = evaluate(first, ctx)?;
            for (op, operand) in rest {
                let right = evaluate(operand, ctx)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Resolved::Val(Value::Bool(false)));
                }
                left = right;
            }
            Ok(Resolved::Val(Value::Bool(true)))
        }
        Expr::And { left, right } => {
            let left = evaluate(left, ctx)?;
            if !truthy(&left) {
                return Ok(Resolved::Val(left));
            }
            Ok(Resolved::Val(evaluate(right, ctx)?))
        }
        Expr::Or { left, right } => {
            let left = evaluate(left, ctx)?;
            if truthy(&left) {
                return Ok(Resolved::Val(left));
            }
            Ok(Resolved::Val(evaluate(right, ctx)?))
        }
        Expr::Not(operand) => {
            let value = evaluate(operand, ctx)?;
            Ok(Resolved::Val(Value::Bool(!truthy(&value))))
        }
        Expr::Conditional { body, cond, orelse } => {
            if truthy(&evaluate(cond, ctx)?) {
                resolve(body, ctx)
            } else {
                resolve(orelse, ctx)
            }
        }
        Expr::ListComp {
            element,
            var,
            iter,
            cond,
        } => {
            let source = evaluate(iter, ctx)?;
            let mut items = Vec::new();
            for bound in iterate(&source)? {
                ctx.locals.push((var.clone(), bound));
                let keep = match cond {
                    Some(cond) => truthy(&evaluate(cond, ctx)?),
                    None => true,
                };
                let result = if keep {
                    Some(evaluate(element, ctx))
                } else {
                    None
                };
                ctx.locals.pop();
                if let Some(result) = result {
                    items.push(result?);
                }
            }
            Ok(Resolved::Val(Value::Array(items)))
        }
        Expr::DictComp {
            key,
            value,
            var,
            iter,
            cond,
        } => {
            let source = evaluate(iter, ctx)?;
            let mut fields = Map::new();
            for bound in iterate(&source)? {
                ctx.locals.push((var.clone(), bound));
                let keep = match cond {
                    Some(cond) => truthy(&evaluate(cond, ctx)?),
                    None => true,
                };
                let entry = if keep {
                    Some(dict_key(key, ctx).and_then(|k| Ok((k, evaluate(value, ctx)?))))
                } else {
                    None
                };
                ctx.locals.pop();
                if let Some(entry) = entry {
                    let (k, v) = entry?;
                    fields.insert(k, v);
                }
            }
            Ok(Resolved::Val(Value::Object(fields)))
        }
    }
}

fn resolve_name(name: &str, ctx: &EvalContext<'_>) -> Result<Resolved, EvalError> {
    // innermost comprehension binding wins
    for (local, value) in ctx.locals.iter().rev() {
        if local == name {
            return Ok(Resolved::Val(value.clone()));
        }
    }
    if name == SIGNAL_NAME {
        return match ctx.signal {
            Some(signal) => Ok(Resolved::Val(signal.to_value())),
            None => Err(EvalError::SignalRequired),
        };
    }
    if let Some(f) = ctx.sandbox.builtin(name) {
        return Ok(Resolved::Func(name.to_string(), f));
    }
    if let Some(module) = ctx.sandbox.module(name) {
        return Ok(Resolved::Module(module));
    }
    Err(EvalError::Name(name.to_string()))
}

fn attribute(target: Resolved, name: &str) -> Result<Resolved, EvalError> {
    match target {
        Resolved::Module(module) => match module.get(name) {
            Some(ModuleEntry::Func(f)) => {
                Ok(Resolved::Func(format!("{}.{name}", module.name()), *f))
            }
            Some(ModuleEntry::Const(value)) => Ok(Resolved::Val(value.clone())),
            None => Err(EvalError::Attribute(format!(
                "module '{}' has no attribute '{name}'",
                module.name()
            ))),
        },
        Resolved::Val(Value::Object(fields)) => match fields.get(name) {
            Some(value) => Ok(Resolved::Val(value.clone())),
            None => Err(EvalError::Attribute(format!("no attribute '{name}'"))),
        },
        Resolved::Val(other) => Err(EvalError::Attribute(format!(
            "value has no attribute '{name}': {other}"
        ))),
        Resolved::Func(name_of, _) => Err(EvalError::Attribute(format!(
            "function '{name_of}' has no attribute '{name}'"
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Array(items), _) => {
            let i = index
                .as_i64()
                .ok_or_else(|| EvalError::Type(format!("list index must be an integer: {index}")))?;
            let len = items.len() as i64;
            let effective = if i < 0 { i + len } else { i };
            if effective < 0 || effective >= len {
                return Err(EvalError::Value(format!("list index out of range: {i}")));
            }
            Ok(items[effective as usize].clone())
        }
        (Value::Object(fields), Value::String(key)) => fields
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::Value(format!("key not found: '{key}'"))),
        (Value::String(text), _) => {
            let i = index.as_i64().ok_or_else(|| {
                EvalError::Type(format!("string index must be an integer: {index}"))
            })?;
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len() as i64;
            let effective = if i < 0 { i + len } else { i };
            if effective < 0 || effective >= len {
                return Err(EvalError::Value(format!("string index out of range: {i}")));
            }
            Ok(Value::String(chars[effective as usize].to_string()))
        }
        (other, _) => Err(EvalError::Type(format!("value is not indexable: {other}"))),
    }
}

fn iterate(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(fields) => Ok(fields.keys().map(|k| Value::String(k.clone())).collect()),
        Value::String(text) => Ok(text
            .chars()
            .map(|c| Value::String(c.to_string()))
            .collect()),
        other => Err(EvalError::Type(format!("value is not iterable: {other}"))),
    }
}

fn dict_key(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<String, EvalError> {
    match evaluate(expr, ctx)? {
        Value::String(key) => Ok(key),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(EvalError::Type(format!("invalid dict key: {other}"))),
    }
}

fn unary(op: &UnaryOp, value: &Value) -> Result<Value, EvalError> {
    let Some(number) = value.as_f64() else {
        return Err(EvalError::Type(format!(
            "unary operand must be a number: {value}"
        )));
    };
    match op {
        UnaryOp::Neg => {
            if let Some(n) = value.as_i64() {
                Ok(Value::from(-n))
            } else {
                float(-number)
            }
        }
        UnaryOp::Pos => Ok(value.clone()),
    }
}

fn float(n: f64) -> Result<Value, EvalError> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| EvalError::Value(format!("result is not a finite number: {n}")))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(Value::Array(items))
            }
            _ => numeric(op, left, right),
        },
        _ => numeric(op, left, right),
    }
}

fn numeric(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (number_of(left), number_of(right)) else {
        return Err(EvalError::Type(format!(
            "unsupported operand types: {left} and {right}"
        )));
    };
    let both_ints = left.is_i64() && right.is_i64();
    match op {
        BinaryOp::Add if both_ints => checked(left.as_i64().unwrap().checked_add(right.as_i64().unwrap())),
        BinaryOp::Sub if both_ints => checked(left.as_i64().unwrap().checked_sub(right.as_i64().unwrap())),
        BinaryOp::Mul if both_ints => checked(left.as_i64().unwrap().checked_mul(right.as_i64().unwrap())),
        BinaryOp::Mod if both_ints => {
            let divisor = right.as_i64().unwrap();
            if divisor == 0 {
                return Err(EvalError::Value("modulo by zero".into()));
            }
            Ok(Value::from(left.as_i64().unwrap().rem_euclid(divisor)))
        }
        BinaryOp::Add => float(a + b),
        BinaryOp::Sub => float(a - b),
        BinaryOp::Mul => float(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::Value("division by zero".into()));
            }
            float(a / b)
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::Value("modulo by zero".into()));
            }
            float(a.rem_euclid(b))
        }
    }
}

fn checked(result: Option<i64>) -> Result<Value, EvalError> {
    result
        .map(Value::from)
        .ok_or_else(|| EvalError::Value("integer overflow".into()))
}

/// Numeric view of a value; booleans deliberately do not count.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Equality with cross-representation numeric comparison.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (number_of(left), number_of(right)) {
        return a == b;
    }
    left == right
}

/// Total order for homogeneous comparable values; mixed types are a type
/// error, mirroring the comparison rules of the expression language.
pub(crate) fn compare_order(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    if let (Some(a), Some(b)) = (number_of(left), number_of(right)) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| EvalError::Value("unordered numeric comparison".into()));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    Err(EvalError::Type(format!(
        "values are not orderable: {left} and {right}"
    )))
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::Lt => Ok(compare_order(left, right)? == Ordering::Less),
        CmpOp::Le => Ok(compare_order(left, right)? != Ordering::Greater),
        CmpOp::Gt => Ok(compare_order(left, right)? == Ordering::Greater),
        CmpOp::Ge => Ok(compare_order(left, right)? != Ordering::Less),
        CmpOp::In => membership(left, right),
        CmpOp::NotIn => membership(left, right).map(|found| !found),
    }
}

fn membership(needle: &Value, haystack: &Value) -> Result<bool, EvalError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| values_equal(needle, item))),
        Value::Object(fields) => match needle {
            Value::String(key) => Ok(fields.contains_key(key)),
            other => Err(EvalError::Type(format!("invalid key type: {other}"))),
        },
        Value::String(text) => match needle {
            Value::String(sub) => Ok(text.contains(sub.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires a string: {other}"
            ))),
        },
        other => Err(EvalError::Type(format!(
            "membership target is not a container: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;
    use serde_json::json;

    fn eval(text: &str, signal: Option<&Signal>) -> Result<Value, EvalError> {
        let expr = parse(text).unwrap();
        let mut ctx = EvalContext::new(signal, Sandbox::current());
        evaluate(&expr, &mut ctx)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", None).unwrap(), json!(7));
        assert_eq!(eval("7 / 2", None).unwrap(), json!(3.5));
        assert_eq!(eval("7 % 3", None).unwrap(), json!(1));
        assert_eq!(eval("-3 + 1", None).unwrap(), json!(-2));
        assert_eq!(
            eval("1 / 0", None),
            Err(EvalError::Value("division by zero".into()))
        );
    }

    #[test]
    fn test_string_and_list_concat() {
        assert_eq!(eval("'a' + 'b'", None).unwrap(), json!("ab"));
        assert_eq!(eval("[1] + [2]", None).unwrap(), json!([1, 2]));
        assert!(matches!(eval("'a' + 1", None), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_boolean_operand_semantics() {
        assert_eq!(eval("0 or 'fallback'", None).unwrap(), json!("fallback"));
        assert_eq!(eval("'x' and 2", None).unwrap(), json!(2));
        assert_eq!(eval("not []", None).unwrap(), json!(true));
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < 2", None).unwrap(), json!(true));
        assert_eq!(eval("1 < 2 < 3", None).unwrap(), json!(true));
        assert_eq!(eval("1 < 2 < 2", None).unwrap(), json!(false));
        assert_eq!(eval("2 in [1, 2]", None).unwrap(), json!(true));
        assert_eq!(eval("'x' not in 'abc'", None).unwrap(), json!(true));
    }

    #[test]
    fn test_conditional_expression() {
        assert_eq!(eval("'big' if 10 > 5 else 'small'", None).unwrap(), json!("big"));
    }

    #[test]
    fn test_signal_access() {
        let signal = Signal::from_value(json!({"count": 3, "tags": ["a", "b"]}));
        assert_eq!(eval("signal.count + 1", Some(&signal)).unwrap(), json!(4));
        assert_eq!(eval("signal.tags[1]", Some(&signal)).unwrap(), json!("b"));
        assert_eq!(eval("signal['count']", Some(&signal)).unwrap(), json!(3));
        assert!(matches!(
            eval("signal.missing", Some(&signal)),
            Err(EvalError::Attribute(_))
        ));
    }

    #[test]
    fn test_signal_required_without_signal() {
        assert_eq!(eval("signal", None), Err(EvalError::SignalRequired));
        assert_eq!(eval("signal.count", None), Err(EvalError::SignalRequired));
        // expressions that never touch the signal still work
        assert_eq!(eval("1 + 2", None).unwrap(), json!(3));
    }

    #[test]
    fn test_unknown_names_raise() {
        assert_eq!(eval("open", None), Err(EvalError::Name("open".into())));
        assert_eq!(
            eval("__import__", None),
            Err(EvalError::Name("__import__".into()))
        );
    }

    #[test]
    fn test_module_calls() {
        assert_eq!(eval("math.ceil(1.8)", None).unwrap(), json!(2));
        assert_eq!(eval("len(range(4))", None).unwrap(), json!(4));
        assert_eq!(
            eval("json.loads('{\"a\": 1}').a", None).unwrap(),
            json!(1)
        );
        assert!(matches!(eval("math", None), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_comprehensions() {
        let signal = Signal::from_value(json!({"items": [1, 2, 3, 4]}));
        assert_eq!(
            eval("[x * 2 for x in signal.items if x > 2]", Some(&signal)).unwrap(),
            json!([6, 8])
        );
        assert_eq!(
            eval("{k: len(k) for k in ['a', 'bb']}", None).unwrap(),
            json!({"a": 1, "bb": 2})
        );
    }
}
