//! Template evaluation against signals, end to end.

use aqueduct::prelude::*;
use aqueduct::EvalError;
use serde_json::json;

fn eval(template: &str, signal: Option<&Signal>) -> Result<serde_json::Value, EvalError> {
    Evaluator::from_text(template).evaluate(signal)
}

#[test]
fn test_scenario_d_native_versus_concatenated() {
    assert_eq!(eval("{{1+5}}", None).unwrap(), json!(6));
    assert_eq!(eval("{{1 + 5}} dogs", None).unwrap(), json!("6 dogs"));
}

#[test]
fn test_signal_attribute_shorthand() {
    let signal = Signal::from_value(json!({
        "str": "string",
        "int": 42,
        "bool": false
    }));
    let cases = [
        ("{{ $str }}", json!("string")),
        ("{{ $.str }}", json!("string")),
        ("{{ $int }}", json!(42)),
        ("{{ $.bool == False }}", json!(true)),
        ("{{ $.bool }}", json!(false)),
        ("{{$.str}},{{$.int}}", json!("string,42")),
        ("{{ $ }}", json!({"str": "string", "int": 42, "bool": false})),
    ];
    for (template, expected) in cases {
        assert_eq!(eval(template, Some(&signal)).unwrap(), expected, "{template}");
    }
}

#[test]
fn test_missing_attribute_raises() {
    let signal = Signal::from_value(json!({"present": 1}));
    assert!(matches!(
        eval("It's a {{ $foo }}", Some(&signal)),
        Err(EvalError::Attribute(_))
    ));
}

#[test]
fn test_type_errors_propagate_untouched() {
    let signal = Signal::from_value(json!({"str": "string", "int": 42}));
    for template in ["{{ $str + 42 }}", "{{ $int + 'string' }}"] {
        assert!(matches!(
            eval(template, Some(&signal)),
            Err(EvalError::Type(_))
        ));
    }
}

#[test]
fn test_expression_isolation() {
    // names outside the allow-list and the bound signal are unreachable
    for template in [
        "{{ open('/etc/passwd') }}",
        "{{ __import__('os') }}",
        "{{ eval('1') }}",
        "{{ globals() }}",
    ] {
        assert!(matches!(eval(template, None), Err(EvalError::Name(_))), "{template}");
    }
}

#[test]
fn test_default_module_allow_list() {
    let signal = Signal::from_value(json!({"two": 2}));
    assert_eq!(eval("{{ math.ceil(1.8) }}", Some(&signal)).unwrap(), json!(2));
    assert_eq!(
        eval("{{ json.dumps([1, 2]) }}", None).unwrap(),
        json!("[1,2]")
    );
    assert_eq!(
        eval("{{ re.findall('[0-9]+', 'a1b22') }}", None).unwrap(),
        json!(["1", "22"])
    );
    let range = eval("{{ random.randint(1, 2) }}", None).unwrap();
    assert!(range == json!(1) || range == json!(2));
    // timestamps render as RFC 3339 text
    let now = eval("{{ datetime.utcnow() }}", None).unwrap();
    assert!(now.as_str().unwrap().contains('T'));
}

#[test]
fn test_evaluation_requires_signal_error() {
    for template in ["{{ $ }}", "{{ $missing }}", "{{ len($) }}"] {
        assert_eq!(eval(template, None), Err(EvalError::SignalRequired), "{template}");
    }
    // signal-free expressions evaluate fine without one
    assert_eq!(eval("{{ 'hello' }}", None).unwrap(), json!("hello"));
}

#[test]
fn test_idempotent_and_raw_preserving() {
    let signal_a = Signal::from_value(json!({"n": 2}));
    let signal_b = Signal::from_value(json!({"n": 2}));
    let evaluator = Evaluator::from_text("{{ $n * 3 }}");
    assert_eq!(
        evaluator.evaluate(Some(&signal_a)).unwrap(),
        evaluator.evaluate(Some(&signal_b)).unwrap()
    );
    assert_eq!(evaluator.raw(), &json!("{{ $n * 3 }}"));
    // non-template values come back unchanged
    assert_eq!(Evaluator::new(json!(42)).evaluate(None).unwrap(), json!(42));
}

#[test]
fn test_comprehensions_and_conditionals_over_signal_data() {
    let signal = Signal::from_value(json!({
        "readings": [12, 7, 31, 3],
        "limit": 10
    }));
    assert_eq!(
        eval("{{ [r for r in $readings if r > $limit] }}", Some(&signal)).unwrap(),
        json!([12, 31])
    );
    assert_eq!(
        eval("{{ 'high' if max($readings) > 30 else 'low' }}", Some(&signal)).unwrap(),
        json!("high")
    );
    assert_eq!(
        eval("{{ {str(r): r * 2 for r in $readings} }}", Some(&signal)).unwrap(),
        json!({"12": 24, "7": 14, "31": 62, "3": 6})
    );
}
