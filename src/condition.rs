//! Conditional visibility and requiredness.
//!
//! A field's `visibleIf` / `mandatoryIf` rule is compiled into a small
//! [`Expr`] tree and evaluated against an explicit map of current values.
//! Nothing is cached: every call recomputes from `(field, values)`, so the
//! live form can re-run it on every change.
//!
//! # Structured rules
//!
//! `{key, value}` where either side may be a scalar, a list, or a
//! comma-separated string. Keys and expected values pair up by position and
//! every pair must hold. A position without its own expected value reuses
//! the first one, so a single key only ever checks the first expected
//! value. Membership needs an expected value that is itself a list, as in
//! `{"key": ["region"], "value": [["eu", "uk"]]}`.
//!
//! Comparisons use loose equality ([`loose_eq`]). When the live value is a
//! boolean, an expected `"true"`/`"false"` string (any case) is compared as
//! a boolean. For `mandatoryIf`, an expected null or empty string holds when
//! the controller is cleared (missing, null or `""`).
//!
//! # Expression rules
//!
//! Older templates store a string such as `"mode == 'advanced'"`. These are
//! parsed by [`crate::expr`] into the same tree; no code is ever executed.
//!
//! # Failure policy
//!
//! A rule that fails to compile makes the field invisible and not
//! mandatory. The error is logged at `warn` and never propagated.

use serde_json::Value;

use crate::error::ConfformError;
use crate::parse::unquote;
use crate::schema::{Condition, Field};
use crate::types::Record;

/// Which rule is being compiled. Only `mandatoryIf` has the "controller
/// cleared" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Visibility,
    Mandatory,
}

/// Compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(bool),
    /// `key == expected` (or `===`, `!=`, `!==`).
    Compare {
        key: String,
        expected: Value,
        strict: bool,
        negate: bool,
    },
    /// Live value loosely equals any of `options`.
    AnyOf { key: String, options: Vec<Value> },
    /// Live value is missing, null or `""`.
    Cleared { key: String },
    /// JavaScript-style truthiness of the live value.
    Truthy { key: String },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn evaluate(&self, values: &Record) -> bool {
        match self {
            Expr::Const(b) => *b,
            Expr::Compare {
                key,
                expected,
                strict,
                negate,
            } => {
                let live = values.get(key);
                let equal = if *strict {
                    strict_eq(live, expected)
                } else {
                    loose_eq(live, &coerce_expected(live, expected))
                };
                equal != *negate
            }
            Expr::AnyOf { key, options } => {
                let live = values.get(key);
                options
                    .iter()
                    .any(|opt| loose_eq(live, &coerce_expected(live, opt)))
            }
            Expr::Cleared { key } => is_cleared(values.get(key)),
            Expr::Truthy { key } => values.get(key).is_some_and(truthy),
            Expr::Not(inner) => !inner.evaluate(values),
            Expr::And(items) => items.iter().all(|e| e.evaluate(values)),
            Expr::Or(items) => items.iter().any(|e| e.evaluate(values)),
        }
    }

    /// Describe the first unmet comparison, for hidden-field messages.
    pub fn first_unmet(&self, values: &Record) -> Option<String> {
        match self {
            Expr::And(items) => items.iter().find_map(|e| e.first_unmet(values)),
            _ if self.evaluate(values) => None,
            Expr::Compare { key, expected, .. } => Some(format!(
                "{key} is \"{}\" but should be \"{}\"",
                display_live(values.get(key)),
                js_string(expected)
            )),
            Expr::AnyOf { key, options } => Some(format!(
                "{key} is \"{}\" but should be one of \"{}\"",
                display_live(values.get(key)),
                options.iter().map(js_string).collect::<Vec<_>>().join(", ")
            )),
            Expr::Cleared { key } => Some(format!(
                "{key} is \"{}\" but should be empty",
                display_live(values.get(key))
            )),
            _ => None,
        }
    }
}

/// Compile a rule. `Ok(None)` means the rule names no controlling key and
/// therefore does not constrain the field.
pub fn compile(condition: &Condition, purpose: Purpose) -> Result<Option<Expr>, ConfformError> {
    match condition {
        Condition::Rule { key, value } => {
            let keys = key.as_ref().map(|k| k.keys()).unwrap_or_default();
            Ok(compile_rule(&keys, value, purpose))
        }
        Condition::Expression(text) if text.trim().is_empty() => Ok(None),
        Condition::Expression(text) => crate::expr::parse_expression(text).map(Some),
    }
}

fn compile_rule(keys: &[String], value: &Value, purpose: Purpose) -> Option<Expr> {
    if keys.is_empty() {
        return None;
    }
    let expected = expected_values(value);
    let clauses = keys
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            let exp = expected.get(idx).unwrap_or(&expected[0]);
            clause(key, exp, purpose)
        })
        .collect();
    Some(Expr::And(clauses))
}

fn clause(key: &str, expected: &Value, purpose: Purpose) -> Expr {
    match expected {
        Value::Array(options) => Expr::AnyOf {
            key: key.to_string(),
            options: options.clone(),
        },
        _ if purpose == Purpose::Mandatory && is_cleared(Some(expected)) => Expr::Cleared {
            key: key.to_string(),
        },
        _ => Expr::Compare {
            key: key.to_string(),
            expected: expected.clone(),
            strict: false,
            negate: false,
        },
    }
}

/// Expected values as a non-empty list.
fn expected_values(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
        Value::Array(items) if !items.is_empty() => items.clone(),
        Value::Array(_) => vec![Value::Null],
        other => vec![other.clone()],
    }
}

fn coerce_expected(live: Option<&Value>, expected: &Value) -> Value {
    if let (Some(Value::Bool(_)), Value::String(s)) = (live, expected) {
        if s.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
    }
    expected.clone()
}

fn is_cleared(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn display_live(value: Option<&Value>) -> String {
    value.map(js_string).unwrap_or_else(|| "undefined".into())
}

/// Evaluate one rule against `values`, surfacing compile errors.
/// `Ok(None)` when the rule does not constrain the field.
pub fn evaluate(
    condition: &Condition,
    purpose: Purpose,
    values: &Record,
) -> Result<Option<bool>, ConfformError> {
    Ok(compile(condition, purpose)?.map(|expr| expr.evaluate(values)))
}

/// Whether `field` is visible given the current `values`.
pub fn is_visible(field: &Field, values: &Record) -> bool {
    let Some(condition) = &field.visible_if else {
        return true;
    };
    match evaluate(condition, Purpose::Visibility, values) {
        Ok(visible) => visible.unwrap_or(true),
        Err(e) => {
            tracing::warn!(key = %field.key, error = %e, "visibleIf failed; treating field as hidden");
            false
        }
    }
}

/// Whether `field` is required given the current `values`.
pub fn is_mandatory(field: &Field, values: &Record) -> bool {
    let Some(condition) = &field.mandatory_if else {
        return field.is_statically_mandatory();
    };
    match evaluate(condition, Purpose::Mandatory, values) {
        Ok(mandatory) => mandatory.unwrap_or_else(|| field.is_statically_mandatory()),
        Err(e) => {
            tracing::warn!(key = %field.key, error = %e, "mandatoryIf failed; treating field as optional");
            false
        }
    }
}

/// Reason a field is hidden, if its `visibleIf` rule explains it.
pub fn hidden_reason(field: &Field, values: &Record) -> Option<String> {
    let condition = field.visible_if.as_ref()?;
    let expr = compile(condition, Purpose::Visibility).ok()??;
    expr.first_unmet(values)
        .map(|detail| format!("Hidden because {detail}"))
}

/// Turn raw strict-parse text into the values conditions compare against:
/// one pair of quotes stripped, `"true"`/`"false"` (any case) as booleans.
pub fn condition_values(record: &Record) -> Record {
    record
        .iter()
        .map(|(key, value)| {
            let normalized = match value {
                Value::String(raw) => {
                    let inner = unquote(raw);
                    if inner.eq_ignore_ascii_case("true") {
                        Value::Bool(true)
                    } else if inner.eq_ignore_ascii_case("false") {
                        Value::Bool(false)
                    } else {
                        Value::String(inner.to_string())
                    }
                }
                other => other.clone(),
            };
            (key.clone(), normalized)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JavaScript-compatible comparison
// ---------------------------------------------------------------------------

/// Loose (`==`) equality between a live value (possibly absent) and an
/// expected value. Absent behaves like JavaScript `undefined`.
pub fn loose_eq(live: Option<&Value>, expected: &Value) -> bool {
    match live {
        None => expected.is_null(),
        Some(v) => loose_eq_values(v, expected),
    }
}

fn loose_eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), _) => loose_eq_values(&bool_number(*x), b),
        (_, Value::Bool(y)) => loose_eq_values(a, &bool_number(*y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (js_number(s), n.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => false,
        (Value::Array(_) | Value::Object(_), _) => {
            loose_eq_values(&Value::String(js_string(a)), b)
        }
        (_, Value::Array(_) | Value::Object(_)) => {
            loose_eq_values(a, &Value::String(js_string(b)))
        }
    }
}

fn strict_eq(live: Option<&Value>, expected: &Value) -> bool {
    match (live, expected) {
        (None, _) => false,
        (Some(Value::Number(x)), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Some(Value::Array(_) | Value::Object(_)), _) => false,
        (Some(a), b) => a == b,
    }
}

fn bool_number(b: bool) -> Value {
    Value::from(if b { 1 } else { 0 })
}

/// String to number the way JavaScript's `Number()` does for decimal text.
fn js_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse().ok()
}

/// Value to string the way JavaScript's `String()` does.
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".into(),
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
