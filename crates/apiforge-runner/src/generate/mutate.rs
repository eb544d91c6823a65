//! Payload mutations for negative, boundary, security and performance cases
//!
//! Every mutation starts from a schema-valid sample and rewrites top-level
//! fields plus one level of nested objects.

use serde_json::{Map, Value, json};

use crate::datagen::schema_type;
use crate::spec::object_properties;

pub const SQL_INJECTION: [&str; 3] = [
    "' OR '1'='1",
    "'; DROP TABLE users; --",
    "1' UNION SELECT * FROM users--",
];

pub const XSS: [&str; 3] = [
    "<script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "javascript:alert('XSS')",
];

pub const PATH_TRAVERSAL: &str = "../../../etc/passwd";

/// String length used by the max-length boundary probe.
pub const MAX_LENGTH_PROBE: usize = 1000;

pub const NUMERIC_BOUNDARIES: [(&str, i64); 4] = [
    ("Zero", 0),
    ("Negative", -1),
    ("Max integer", i32::MAX as i64),
    ("Min integer", i32::MIN as i64),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryProbe {
    EmptyString,
    MaxLength,
    MinLength,
    Numeric(i64),
}

impl BoundaryProbe {
    pub const STRINGS: [(&'static str, Self); 3] = [
        ("Empty string", Self::EmptyString),
        ("Max length", Self::MaxLength),
        ("Min length", Self::MinLength),
    ];
}

/// Replace every value with one of an incompatible JSON type.
#[must_use]
pub fn flip_types(payload: &Value) -> Value {
    let Some(obj) = payload.as_object().filter(|o| !o.is_empty()) else {
        return json!({"name": 12345, "id": "invalid_string", "status": 999, "invalidField": null});
    };
    let flipped = obj
        .iter()
        .map(|(k, v)| {
            let new = match v {
                Value::Object(nested) => Value::Object(
                    nested
                        .iter()
                        .map(|(nk, nv)| (nk.clone(), flip_nested(nv)))
                        .collect(),
                ),
                other => flip_scalar(other),
            };
            (k.clone(), new)
        })
        .collect();
    Value::Object(flipped)
}

fn flip_scalar(v: &Value) -> Value {
    match v {
        Value::String(_) => json!(12345),
        Value::Number(_) => json!("invalid_string"),
        Value::Bool(_) => json!("not_boolean"),
        Value::Array(_) => json!("not_an_array"),
        Value::Null => json!("not_null"),
        Value::Object(_) => json!("not_an_object"),
    }
}

fn flip_nested(v: &Value) -> Value {
    match v {
        Value::Number(_) => json!("invalid"),
        other => flip_scalar(other),
    }
}

/// Apply a boundary probe to every string (or number) field.
#[must_use]
pub fn apply_boundary(payload: &Value, probe: BoundaryProbe) -> Value {
    let mut out = match payload.as_object().filter(|o| !o.is_empty()) {
        Some(obj) => obj.clone(),
        None => boundary_fallback(),
    };
    for value in out.values_mut() {
        match value {
            Value::Object(nested) => nested.values_mut().for_each(|nv| probe_value(nv, probe)),
            other => probe_value(other, probe),
        }
    }
    Value::Object(out)
}

fn boundary_fallback() -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("name".into(), json!("test"));
    m.insert("id".into(), json!(1));
    m.insert("value".into(), json!(1));
    m
}

fn probe_value(value: &mut Value, probe: BoundaryProbe) {
    match (probe, &*value) {
        (BoundaryProbe::EmptyString, Value::String(_)) => *value = json!(""),
        (BoundaryProbe::MaxLength, Value::String(_)) => {
            *value = Value::String("a".repeat(MAX_LENGTH_PROBE));
        }
        (BoundaryProbe::MinLength, Value::String(_)) => *value = json!("a"),
        (BoundaryProbe::Numeric(n), Value::Number(_)) => *value = json!(n),
        _ => {}
    }
}

/// Inject an attack string into fields, preferring ones whose constraints it
/// violates (enum, format, numeric type).
#[must_use]
pub fn inject_attack(payload: &Value, body_schema: Option<&Value>, vector: &str) -> Value {
    let Some(obj) = payload.as_object().filter(|o| !o.is_empty()) else {
        return json!({"name": vector, "description": vector});
    };
    let properties = body_schema.map(object_properties).unwrap_or_default();
    let attack = || Value::String(vector.to_string());

    let mut out = obj.clone();
    for (key, value) in &mut out {
        let prop = properties.get(key);
        let declared = prop.and_then(schema_type);
        let constrained =
            prop.is_some_and(|p| p.get("enum").is_some() || p.get("format").is_some());
        match value {
            Value::String(_) if constrained || declared.is_none_or(|t| t == "string") => {
                *value = attack();
            }
            Value::Number(_) if matches!(declared, Some("integer" | "number")) => *value = attack(),
            Value::Object(nested) => {
                for nv in nested.values_mut() {
                    if nv.is_string() {
                        *nv = attack();
                    }
                }
            }
            _ => {}
        }
    }
    Value::Object(out)
}

/// Drop `field` and turn every remaining string into an XSS vector.
#[must_use]
pub fn missing_field_with_attack(payload: &Value, field: &str) -> Value {
    let mut out = payload.as_object().cloned().unwrap_or_default();
    out.remove(field);
    for value in out.values_mut() {
        if value.is_string() {
            *value = Value::String(XSS[0].to_string());
        }
    }
    Value::Object(out)
}

/// Inflate strings, arrays and nested objects without tripping size limits.
#[must_use]
pub fn enlarge(payload: &Value) -> Value {
    let mut out = payload.as_object().cloned().unwrap_or_default();
    for value in out.values_mut() {
        match value {
            Value::String(_) => *value = Value::String("x".repeat(1000)),
            Value::Array(_) => {
                *value = Value::Array((0..100).map(|i| json!({"item": i})).collect());
            }
            Value::Object(nested) => {
                for i in 0..10 {
                    nested.insert(format!("field_{i}"), Value::String("x".repeat(100)));
                }
            }
            _ => {}
        }
    }
    Value::Object(out)
}

/// Remove a single top-level field.
#[must_use]
pub fn without_field(payload: &Value, field: &str) -> Value {
    let mut out = payload.as_object().cloned().unwrap_or_default();
    out.remove(field);
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "name": "doggie",
            "age": 3,
            "vaccinated": true,
            "tags": ["a"],
            "owner": {"email": "x@y.z", "id": 7, "address": {"city": "c"}}
        })
    }

    // ── flip_types ──

    #[test]
    fn flip_types_changes_every_top_level_type() {
        let v = flip_types(&sample());
        assert_eq!(v["name"], json!(12345));
        assert_eq!(v["age"], json!("invalid_string"));
        assert_eq!(v["vaccinated"], json!("not_boolean"));
        assert_eq!(v["tags"], json!("not_an_array"));
        assert_eq!(v["owner"]["email"], json!(12345));
        assert_eq!(v["owner"]["id"], json!("invalid"));
        assert_eq!(v["owner"]["address"], json!("not_an_object"));
    }

    #[test]
    fn flip_types_empty_payload_gets_wrong_shape() {
        let v = flip_types(&json!({}));
        assert_eq!(v["name"], json!(12345));
        assert!(v["invalidField"].is_null());
    }

    // ── apply_boundary ──

    #[test]
    fn boundary_strings() {
        let p = sample();
        assert_eq!(apply_boundary(&p, BoundaryProbe::EmptyString)["name"], json!(""));
        assert_eq!(
            apply_boundary(&p, BoundaryProbe::MaxLength)["owner"]["email"]
                .as_str()
                .unwrap()
                .len(),
            MAX_LENGTH_PROBE
        );
        assert_eq!(apply_boundary(&p, BoundaryProbe::MinLength)["name"], json!("a"));
    }

    #[test]
    fn boundary_numeric_leaves_strings() {
        let v = apply_boundary(&sample(), BoundaryProbe::Numeric(-1));
        assert_eq!(v["age"], json!(-1));
        assert_eq!(v["owner"]["id"], json!(-1));
        assert_eq!(v["name"], json!("doggie"));
    }

    #[test]
    fn boundary_on_empty_payload_uses_fallback() {
        let v = apply_boundary(&json!({}), BoundaryProbe::Numeric(0));
        assert_eq!(v, json!({"name": "test", "id": 0, "value": 0}));
    }

    // ── inject_attack ──

    #[test]
    fn attack_targets_enum_and_numeric_fields() {
        let schema = json!({"type": "object", "properties": {
            "status": {"type": "string", "enum": ["available"]},
            "count": {"type": "integer"},
            "flag": {"type": "boolean"}
        }});
        let payload = json!({"status": "available", "count": 1, "flag": true});
        let v = inject_attack(&payload, Some(&schema), SQL_INJECTION[0]);
        assert_eq!(v["status"], json!(SQL_INJECTION[0]));
        assert_eq!(v["count"], json!(SQL_INJECTION[0]));
        assert_eq!(v["flag"], json!(true));
    }

    #[test]
    fn attack_without_schema_hits_strings() {
        let v = inject_attack(&sample(), None, XSS[1]);
        assert_eq!(v["name"], json!(XSS[1]));
        assert_eq!(v["age"], json!(3));
        assert_eq!(v["owner"]["email"], json!(XSS[1]));
    }

    #[test]
    fn attack_on_empty_payload() {
        let v = inject_attack(&json!({}), None, "x");
        assert_eq!(v, json!({"name": "x", "description": "x"}));
    }

    // ── misc ──

    #[test]
    fn missing_field_with_attack_drops_exactly_one() {
        let v = missing_field_with_attack(&sample(), "name");
        assert!(v.get("name").is_none());
        assert_eq!(v["age"], json!(3));
        assert_eq!(v.as_object().unwrap().len(), 4);
    }

    #[test]
    fn enlarge_grows_collections() {
        let v = enlarge(&sample());
        assert_eq!(v["name"].as_str().unwrap().len(), 1000);
        assert_eq!(v["tags"].as_array().unwrap().len(), 100);
        assert_eq!(v["owner"]["field_9"].as_str().unwrap().len(), 100);
    }
}
