//! Tolerant extraction of test-case objects from model output
//!
//! Models wrap JSON in code fences, add trailing commas, or get cut off
//! mid-array. Extraction strips fences, removes trailing commas outside
//! strings, parses the first complete value, and when the array is
//! truncated keeps every complete top-level object seen so far.

use serde_json::{Map, Value};

use apiforge_core::{Assertion, AssertionKind, Operator, TestCategory};

use super::GenerationError;

/// One case as emitted by the model, before repair.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCase {
    pub category: Option<TestCategory>,
    pub name: String,
    pub payload: Map<String, Value>,
    pub expected_status: Vec<u16>,
    pub description: String,
    pub assertions: Vec<Assertion>,
}

/// Maps a model-supplied type label onto a category.
///
/// `edge_case` is folded into [`TestCategory::Boundary`]. Unknown labels
/// return `None` and the case is dropped.
#[must_use]
pub fn category_of(label: &str) -> Option<TestCategory> {
    match label.trim().to_ascii_lowercase().as_str() {
        "edge_case" | "edge-case" | "edge" => Some(TestCategory::Boundary),
        other => other.parse().ok(),
    }
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    body.rsplit_once("```").map_or(body, |(b, _)| b).trim()
}

/// Removes commas that directly precede `]` or `}`, ignoring string contents.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some(']' | '}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Complete top-level objects of a possibly truncated array.
fn salvage_objects(text: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;
    // Skip the opening '[' of the array itself.
    for (i, c) in text.char_indices().skip(1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(v @ Value::Object(_)) = serde_json::from_str(&text[s..=i]) {
                            objects.push(v);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

/// Offset of the first `[` that opens an array of objects, falling back to
/// the first `[` at all. Prose like `cases [5]:` is skipped.
fn array_start(text: &str) -> Option<usize> {
    let first = text.find('[')?;
    let opens_objects = text
        .match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| text[i + 1..].trim_start().starts_with('{'));
    Some(opens_objects.unwrap_or(first))
}

/// Extract the array of case objects from raw model text.
///
/// # Errors
///
/// Returns [`GenerationError::Parse`] when no JSON array or salvageable
/// object is present.
pub fn extract_cases(text: &str) -> Result<Vec<Value>, GenerationError> {
    let body = strip_fences(text);
    let Some(start) = array_start(body) else {
        return Err(GenerationError::Parse(format!(
            "no JSON array in response: {}",
            body.chars().take(200).collect::<String>()
        )));
    };
    let cleaned = strip_trailing_commas(&body[start..]);

    let mut stream = serde_json::Deserializer::from_str(&cleaned).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Array(items))) => {
            return Ok(items.into_iter().filter(Value::is_object).collect());
        }
        Some(Ok(other)) => {
            return Err(GenerationError::Parse(format!(
                "expected an array, got {}",
                type_name(&other)
            )));
        }
        Some(Err(e)) => tracing::debug!(error = %e, "array incomplete, salvaging objects"),
        None => {}
    }

    let salvaged = salvage_objects(&cleaned);
    if salvaged.is_empty() {
        return Err(GenerationError::Parse(
            "response array is truncated and holds no complete case".into(),
        ));
    }
    tracing::warn!(salvaged = salvaged.len(), "recovered cases from truncated response");
    Ok(salvaged)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn status_list(v: Option<&Value>) -> Vec<u16> {
    let as_code = |v: &Value| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .and_then(|n| u16::try_from(n).ok())
    };
    match v {
        Some(Value::Array(items)) => items.iter().filter_map(as_code).collect(),
        Some(other) => as_code(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn parse_operator(s: &str) -> Option<Operator> {
    Some(match s.trim().to_ascii_lowercase().as_str() {
        "equals" | "eq" => Operator::Equals,
        "not_equals" | "ne" => Operator::NotEquals,
        "contains" => Operator::Contains,
        "not_contains" => Operator::NotContains,
        "greater_than" | "gt" => Operator::GreaterThan,
        "less_than" | "lt" => Operator::LessThan,
        "matches" => Operator::Matches,
        "exists" => Operator::Exists,
        "not_exists" => Operator::NotExists,
        _ => return None,
    })
}

fn parse_kind(s: &str) -> Option<AssertionKind> {
    Some(match s.trim().to_ascii_lowercase().as_str() {
        "status_code" | "status" => AssertionKind::StatusCode,
        "response_body" | "body" => AssertionKind::ResponseBody,
        "response_header" | "header" => AssertionKind::ResponseHeader,
        "response_time" => AssertionKind::ResponseTime,
        _ => return None,
    })
}

/// Assertions the model wrote; malformed entries are skipped one by one.
fn parse_assertions(v: Option<&Value>) -> Vec<Assertion> {
    let Some(items) = v.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let kind = parse_kind(item.get("type")?.as_str()?)?;
            let condition = parse_operator(item.get("condition")?.as_str()?)?;
            Some(Assertion {
                kind,
                condition,
                expected_value: item.get("expected_value").cloned().unwrap_or(Value::Null),
                field: item.get("field").and_then(Value::as_str).map(String::from),
                description: item
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Read one case object. Missing or malformed fields fall back to empty.
#[must_use]
pub fn raw_case(v: &Value) -> RawCase {
    let text = |key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    RawCase {
        category: v.get("type").and_then(Value::as_str).and_then(category_of),
        name: text("name"),
        payload: v
            .get("payload")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        expected_status: status_list(v.get("expected_status")),
        description: text("description"),
        assertions: parse_assertions(v.get("assertions")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_array_with_trailing_commas() {
        let text = "Here you go:\n```json\n[\n  {\"type\": \"happy_path\", \"name\": \"ok\", \"payload\": {\"a\": 1,},},\n]\n```\n";
        let cases = extract_cases(text).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0]["payload"], json!({"a": 1}));
    }

    #[test]
    fn commas_inside_strings_survive() {
        let text = r#"[{"name": "a,]", "description": "x, }"}]"#;
        let cases = extract_cases(text).unwrap();
        assert_eq!(cases[0]["name"], "a,]");
        assert_eq!(cases[0]["description"], "x, }");
    }

    #[test]
    fn trailing_prose_after_array_is_ignored() {
        let text = r#"[{"name": "one"}] I hope this helps [not json"#;
        assert_eq!(extract_cases(text).unwrap().len(), 1);
    }

    #[test]
    fn bracketed_prose_before_array_is_skipped() {
        let text = "Generated cases [5]:\n[{\"name\": \"one\"}, {\"name\": \"two\"}]";
        let cases = extract_cases(text).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1]["name"], "two");
    }

    #[test]
    fn bracketed_prose_before_truncated_array_still_salvages() {
        let text = r#"Cases [1/2] follow: [{"name": "one"}, {"name": "tw"#;
        let cases = extract_cases(text).unwrap();
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn truncated_array_keeps_complete_objects() {
        let text = r#"[{"name": "one", "payload": {"x": "}"}}, {"name": "two"}, {"name": "thr"#;
        let cases = extract_cases(text).unwrap();
        let names: Vec<_> = cases.iter().map(|c| c["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["one", "two"]);
    }

    #[test]
    fn no_array_is_a_parse_error() {
        assert!(matches!(
            extract_cases("I cannot help with that."),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(
            extract_cases(r#"[{"name": "cut"#),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn categories_map_edge_case_to_boundary() {
        assert_eq!(category_of("edge_case"), Some(TestCategory::Boundary));
        assert_eq!(category_of("Happy_Path"), Some(TestCategory::HappyPath));
        assert_eq!(category_of("fuzz"), None);
    }

    #[test]
    fn raw_case_accepts_scalar_status_and_skips_bad_assertions() {
        let raw = raw_case(&json!({
            "type": "negative",
            "name": "missing name",
            "payload": {"status": "sold"},
            "expected_status": "422",
            "assertions": [
                {"type": "status_code", "condition": "equals", "expected_value": 422},
                {"type": "vibes", "condition": "equals"},
                {"type": "response_body", "condition": "exists", "field": "error"}
            ]
        }));
        assert_eq!(raw.category, Some(TestCategory::Negative));
        assert_eq!(raw.expected_status, vec![422]);
        assert_eq!(raw.assertions.len(), 2);
        assert_eq!(raw.assertions[1].field.as_deref(), Some("error"));
    }
}
