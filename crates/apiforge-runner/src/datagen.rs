//! JSON Schema → concrete `serde_json::Value` synthesizer
//!
//! Deterministic: the same schema and field name always yield the same
//! value, biased toward inputs a target API is likely to accept. Handles the
//! OpenAPI 3.x / Swagger 2.0 subset: string, integer, number, boolean, array,
//! object, enum, default, const, anyOf, oneOf, allOf.

use rand::Rng;
use serde_json::{Map, Value, json};

use apiforge_core::{BodyEncoding, Fixtures};

use crate::spec::{EndpointDescriptor, ParamLocation, object_properties, required_fields};

/// Maximum recursion depth for schema traversal.
const MAX_DEPTH: u32 = 20;

/// Longest string produced for a `minLength` constraint.
const MAX_STRING_LEN: usize = 10_000;

const SAMPLE_UUID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
const SAMPLE_DATE: &str = "2024-01-15";
const SAMPLE_DATE_TIME: &str = "2024-01-15T12:00:00Z";

/// Enum members preferred for happy-path payloads, in order.
const SAFE_ENUM_MEMBERS: [&str; 2] = ["available", "pending"];

/// A request payload assembled for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePayload {
    /// Body fields; query fields for GET/DELETE/HEAD/OPTIONS.
    pub payload: Value,
    /// Query fields sent alongside a body.
    pub query: Map<String, Value>,
    /// Required header parameters.
    pub headers: Map<String, Value>,
    pub encoding: BodyEncoding,
    pub file_fields: Vec<String>,
}

/// Methods whose payload travels in the query string.
#[must_use]
pub fn uses_query_payload(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "DELETE" | "HEAD" | "OPTIONS"
    )
}

/// Schema-driven value synthesizer with optional per-resource fixtures.
#[derive(Debug, Clone, Default)]
pub struct PayloadSynthesizer {
    fixtures: Fixtures,
}

impl PayloadSynthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    #[must_use]
    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    /// Synthesize one value for `schema`.
    ///
    /// Order: `default`, `enum` (biased), `const`, composition keywords,
    /// then type/format/field-name heuristics.
    #[must_use]
    pub fn value_for(&self, schema: &Value, field_name: Option<&str>) -> Value {
        value_inner(schema, field_name, 0)
    }

    /// Build the payload for a schema-compliant request to `endpoint`.
    #[must_use]
    pub fn sample_payload(&self, endpoint: &EndpointDescriptor) -> SamplePayload {
        let mut query = Map::new();
        for param in endpoint.params_in(ParamLocation::Query) {
            if let Some(v) = self.param_value(&param.schema, &param.name, param.required) {
                query.insert(param.name.clone(), v);
            }
        }
        let mut headers = Map::new();
        for param in endpoint.params_in(ParamLocation::Header) {
            if param.required {
                headers.insert(param.name.clone(), self.value_for(&param.schema, Some(&param.name)));
            }
        }

        if uses_query_payload(&endpoint.method) {
            return SamplePayload {
                payload: Value::Object(query),
                query: Map::new(),
                headers,
                encoding: BodyEncoding::Json,
                file_fields: Vec::new(),
            };
        }

        let fixture = self.fixtures.get(endpoint.resource());
        let Some(target) = endpoint.body_target() else {
            let payload = fixture.cloned().unwrap_or_else(generic_payload);
            return SamplePayload {
                payload,
                query,
                headers,
                encoding: BodyEncoding::Json,
                file_fields: Vec::new(),
            };
        };

        let file_fields = endpoint.file_fields();
        let mut payload = match target.encoding {
            BodyEncoding::Binary => Value::Object(Map::new()),
            _ => self.value_for(target.schema, None),
        };
        if let Value::Object(obj) = &mut payload {
            for field in &file_fields {
                obj.remove(field);
            }
            if let Some(Value::Object(overrides)) = fixture {
                for (k, v) in overrides {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        SamplePayload {
            payload,
            query,
            headers,
            encoding: target.encoding,
            file_fields,
        }
    }

    /// Query/header value: declared default, else synthesized when required.
    fn param_value(&self, schema: &Value, name: &str, required: bool) -> Option<Value> {
        if let Some(d) = schema.get("default") {
            return Some(d.clone());
        }
        required.then(|| self.value_for(schema, Some(name)))
    }

    /// Known-good payload for a resource, if configured.
    #[must_use]
    pub fn fixture_for(&self, resource: &str) -> Option<&Value> {
        self.fixtures.get(resource)
    }
}

/// Body used when an endpoint declares none and no fixture exists.
fn generic_payload() -> Value {
    json!({
        "name": "Test Item",
        "description": "Test Description",
        "status": "active"
    })
}

/// Pick the enum member most likely to be accepted.
#[must_use]
pub fn biased_enum(values: &[Value]) -> Option<Value> {
    SAFE_ENUM_MEMBERS
        .iter()
        .find_map(|safe| values.iter().find(|v| v.as_str() == Some(safe)))
        .or_else(|| values.first())
        .cloned()
}

/// First declared type, skipping `"null"` in OpenAPI 3.1 type arrays.
#[must_use]
pub fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn value_inner(schema: &Value, field_name: Option<&str>, depth: u32) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }

    // A `$ref` that survived resolution is a cycle; stop here.
    if schema.get("$ref").is_some() {
        return Value::Object(Map::new());
    }

    if let Some(default) = schema.get("default") {
        return default.clone();
    }

    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        if let Some(v) = biased_enum(values) {
            return v;
        }
    }

    if let Some(c) = schema.get("const") {
        return c.clone();
    }

    if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
        if !members.is_empty() {
            let merged = json!({
                "type": "object",
                "properties": object_properties(schema),
                "required": required_fields(schema),
            });
            return object_value(&merged, depth + 1);
        }
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(variants) = schema.get(key).and_then(Value::as_array) {
            return variants
                .iter()
                .find(|s| schema_type(s) != Some("null"))
                .map_or(Value::Null, |s| value_inner(s, field_name, depth + 1));
        }
    }

    match schema_type(schema) {
        Some("string") => string_value(schema, field_name),
        Some("integer") => integer_value(schema, field_name),
        Some("number") => number_value(schema, field_name),
        Some("boolean") => Value::Bool(true),
        Some("array") => array_value(schema, field_name, depth + 1),
        Some("object") => object_value(schema, depth + 1),
        Some("null") => Value::Null,
        _ => {
            if schema.get("properties").is_some() {
                object_value(schema, depth + 1)
            } else if schema.get("items").is_some() {
                array_value(schema, field_name, depth + 1)
            } else {
                string_value(schema, field_name)
            }
        }
    }
}

fn string_value(schema: &Value, field_name: Option<&str>) -> Value {
    let format = schema.get("format").and_then(Value::as_str);
    let base = format
        .and_then(string_for_format)
        .or_else(|| field_name.and_then(string_for_name))
        .unwrap_or("sample_string");

    let min = schema
        .get("minLength")
        .and_then(Value::as_u64)
        .map_or(0, |v| (v as usize).min(MAX_STRING_LEN));
    let max = schema
        .get("maxLength")
        .and_then(Value::as_u64)
        .map(|v| v as usize);

    let mut s = base.to_string();
    let len = s.chars().count();
    if len < min {
        s.push_str(&"a".repeat(min - len));
    }
    if let Some(max) = max {
        if s.chars().count() > max {
            s = s.chars().take(max).collect();
        }
    }
    Value::String(s)
}

fn string_for_format(format: &str) -> Option<&'static str> {
    Some(match format {
        "email" => "test@example.com",
        "date" => SAMPLE_DATE,
        "date-time" => SAMPLE_DATE_TIME,
        "time" => "12:00:00",
        "uuid" => SAMPLE_UUID,
        "uri" | "url" | "uri-reference" => "https://example.com",
        "hostname" => "example.com",
        "ipv4" => "192.168.1.1",
        "ipv6" => "::1",
        "byte" => "dGVzdA==",
        "binary" => "test",
        "password" => "P@ssw0rd123",
        _ => return None,
    })
}

/// Field-name heuristics for strings without a recognised format.
fn string_for_name(name: &str) -> Option<&'static str> {
    let n = name.to_ascii_lowercase();
    let has = |needle: &str| n.contains(needle);
    Some(if has("email") {
        "test@example.com"
    } else if has("uuid") || has("guid") {
        SAMPLE_UUID
    } else if has("password") {
        "P@ssw0rd123"
    } else if has("username") || n == "login" {
        "testuser"
    } else if has("firstname") || has("first_name") {
        "John"
    } else if has("lastname") || has("last_name") {
        "Doe"
    } else if has("phone") || has("mobile") {
        "+1-555-0100"
    } else if has("url") || has("uri") || has("link") || has("website") {
        "https://example.com"
    } else if has("zip") || has("postal") {
        "12345"
    } else if has("country") {
        "US"
    } else if has("city") {
        "Springfield"
    } else if has("address") || has("street") {
        "123 Main St"
    } else if has("date") || has("birth") {
        SAMPLE_DATE
    } else if n.ends_with("_at") || has("time") {
        SAMPLE_DATE_TIME
    } else if has("description") {
        "Test description"
    } else if n == "name" || n.ends_with("name") {
        "Test name"
    } else {
        return None;
    })
}

fn integer_value(schema: &Value, field_name: Option<&str>) -> Value {
    let n = field_name.unwrap_or("").to_ascii_lowercase();
    let preferred: i64 = if n.contains("age") {
        30
    } else if n.contains("year") {
        2024
    } else if n.contains("price") || n.contains("amount") || n.contains("cost") {
        10
    } else {
        1
    };

    let (min, max) = numeric_bounds(schema);
    let mut v = preferred as f64;
    if let Some(min) = min {
        if v < min {
            v = min.ceil();
        }
    }
    if let Some(max) = max {
        if v > max {
            v = max.floor();
        }
    }
    Value::from(v as i64)
}

fn number_value(schema: &Value, field_name: Option<&str>) -> Value {
    let n = field_name.unwrap_or("").to_ascii_lowercase();
    let preferred: f64 = if ["price", "amount", "cost", "total"]
        .iter()
        .any(|k| n.contains(k))
    {
        9.99
    } else if n.contains("rate") || n.contains("ratio") {
        0.5
    } else {
        1.0
    };
    let (min, max) = numeric_bounds(schema);
    let v = min.map_or(preferred, |m| preferred.max(m));
    let v = max.map_or(v, |m| v.min(m));
    json!(v)
}

/// Inclusive bounds, nudging exclusive limits inward by one.
fn numeric_bounds(schema: &Value) -> (Option<f64>, Option<f64>) {
    let bound = |key: &str, exclusive_key: &str, step: f64| -> Option<f64> {
        match schema.get(exclusive_key) {
            // OpenAPI 3.1: numeric exclusive bound
            Some(Value::Number(n)) => n.as_f64().map(|v| v + step),
            // OpenAPI 3.0: boolean flag on the plain bound
            Some(Value::Bool(true)) => schema.get(key).and_then(Value::as_f64).map(|v| v + step),
            _ => schema.get(key).and_then(Value::as_f64),
        }
    };
    (
        bound("minimum", "exclusiveMinimum", 1.0),
        bound("maximum", "exclusiveMaximum", -1.0),
    )
}

fn array_value(schema: &Value, field_name: Option<&str>, depth: u32) -> Value {
    let max = schema.get("maxItems").and_then(Value::as_u64);
    if max == Some(0) {
        return Value::Array(Vec::new());
    }
    let count = schema
        .get("minItems")
        .and_then(Value::as_u64)
        .unwrap_or(1)
        .max(1)
        .min(max.unwrap_or(u64::MAX))
        .min(100) as usize;

    let items = schema
        .get("items")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));

    if let Some(values) = items.get("enum").and_then(Value::as_array) {
        if let Some(v) = biased_enum(values) {
            return Value::Array(vec![v]);
        }
    }
    let item = value_inner(&items, field_name, depth);
    Value::Array(vec![item; count])
}

fn object_value(schema: &Value, depth: u32) -> Value {
    let required = required_fields(schema);
    let mut obj = Map::new();
    for (key, prop) in object_properties(schema) {
        if required.contains(&key) {
            obj.insert(key.clone(), value_inner(&prop, Some(&key), depth));
        } else if prop.get("default").is_some() || prop.get("enum").is_some() {
            obj.insert(key.clone(), value_inner(&prop, Some(&key), depth));
        } else if is_object_schema(&prop) {
            let nested = value_inner(&prop, Some(&key), depth);
            if nested.as_object().is_some_and(|o| !o.is_empty()) {
                obj.insert(key.clone(), nested);
            }
        }
    }
    Value::Object(obj)
}

fn is_object_schema(schema: &Value) -> bool {
    schema_type(schema) == Some("object") || schema.get("properties").is_some()
}

/// Render a value for a path segment, query string or header.
#[must_use]
pub fn value_to_param_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `len` characters from `[a-z0-9]`.
pub fn random_suffix(rng: &mut impl Rng, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
