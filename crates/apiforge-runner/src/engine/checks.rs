//! Assertion evaluation
//!
//! No I/O. Every assertion is judged against an [`Exchange`] that already
//! holds the full response.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use apiforge_core::{Assertion, AssertionKind, AssertionOutcome, Operator};

/// Response facts assertions can inspect.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body_text: String,
    pub body_json: Option<Value>,
    pub elapsed: Duration,
}

/// Walk a dot path with numeric array indices: `items.0.name`.
#[must_use]
pub fn lookup_field<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality that treats `200` and `"200"` as the same value.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => !actual.is_null() && text_of(actual) == text_of(expected),
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
        Value::Object(map) => expected.as_str().is_some_and(|k| map.contains_key(k)),
        Value::Null => false,
        other => text_of(other).contains(&text_of(expected)),
    }
}

fn present(actual: &Value) -> bool {
    !actual.is_null() && actual.as_str() != Some("")
}

/// Apply `op` to `actual` and `expected`.
///
/// # Errors
///
/// Returns a message when the comparison cannot be made (non-numeric
/// operands for ordering, invalid regex).
pub fn compare(op: Operator, actual: &Value, expected: &Value) -> Result<bool, String> {
    let ordered = |f: fn(f64, f64) -> bool| match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => Ok(f(a, b)),
        _ => Err(format!("cannot compare {actual} with {expected} numerically")),
    };
    match op {
        Operator::Equals => Ok(loosely_equal(actual, expected)),
        Operator::NotEquals => Ok(!loosely_equal(actual, expected)),
        Operator::Contains => Ok(contains(actual, expected)),
        Operator::NotContains => Ok(!contains(actual, expected)),
        Operator::GreaterThan => ordered(|a, b| a > b),
        Operator::LessThan => ordered(|a, b| a < b),
        Operator::Matches => Regex::new(&text_of(expected))
            .map(|re| re.is_match(&text_of(actual)))
            .map_err(|e| format!("invalid pattern: {e}")),
        Operator::Exists => Ok(present(actual)),
        Operator::NotExists => Ok(!present(actual)),
    }
}

fn actual_value(assertion: &Assertion, exchange: &Exchange) -> Value {
    match assertion.kind {
        AssertionKind::StatusCode => Value::from(exchange.status),
        AssertionKind::ResponseTime => Value::from(exchange.elapsed.as_secs_f64()),
        AssertionKind::ResponseHeader => {
            let name = assertion.field.as_deref().unwrap_or_default().to_ascii_lowercase();
            exchange
                .headers
                .get(&name)
                .map_or(Value::Null, |v| Value::String(v.clone()))
        }
        AssertionKind::ResponseBody => {
            let field = assertion.field.as_deref().unwrap_or_default();
            match &exchange.body_json {
                Some(json) => lookup_field(json, field).cloned().unwrap_or(Value::Null),
                None if field.is_empty() => Value::String(exchange.body_text.clone()),
                None => Value::Null,
            }
        }
    }
}

fn subject(assertion: &Assertion) -> String {
    match (assertion.kind, assertion.field.as_deref()) {
        (AssertionKind::StatusCode, _) => "Status code".to_string(),
        (AssertionKind::ResponseTime, _) => "Response time (s)".to_string(),
        (AssertionKind::ResponseHeader, f) => format!("Header {}", f.unwrap_or_default()),
        (AssertionKind::ResponseBody, Some(f)) => format!("Response body field {f}"),
        (AssertionKind::ResponseBody, None) => "Response body".to_string(),
    }
}

/// Evaluate one assertion.
#[must_use]
pub fn evaluate(assertion: &Assertion, exchange: &Exchange) -> AssertionOutcome {
    let actual = actual_value(assertion, exchange);
    let (passed, message) = match compare(assertion.condition, &actual, &assertion.expected_value) {
        Ok(passed) => {
            let verdict = if passed { "holds" } else { "does not hold" };
            let message = match assertion.condition {
                Operator::Exists | Operator::NotExists => {
                    format!("{} {}: {verdict}", subject(assertion), assertion.condition)
                }
                op => format!(
                    "{} {actual} {op} {}: {verdict}",
                    subject(assertion),
                    assertion.expected_value
                ),
            };
            (passed, message)
        }
        Err(reason) => (false, format!("{}: {reason}", subject(assertion))),
    };
    AssertionOutcome {
        kind: assertion.kind,
        condition: assertion.condition,
        field: assertion.field.clone(),
        expected_value: assertion.expected_value.clone(),
        actual_value: actual,
        passed,
        message,
    }
}

#[must_use]
pub fn evaluate_all(assertions: &[Assertion], exchange: &Exchange) -> Vec<AssertionOutcome> {
    assertions.iter().map(|a| evaluate(a, exchange)).collect()
}
