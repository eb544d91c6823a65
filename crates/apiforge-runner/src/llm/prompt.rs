//! Prompt construction
//!
//! The prompt embeds the resolved request and response schemas, an explicit
//! whitelist of field names, and for multi-value enum query parameters the
//! exact payload variants the model must emit.

use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::spec::{EndpointDescriptor, ParamLocation};

pub const SYSTEM_PROMPT: &str = "You generate black-box API test cases from OpenAPI schemas. \
Reply with a single JSON array of test case objects and nothing else.";

/// Properties listed individually before the rest are elided.
const MAX_LISTED_PROPERTIES: usize = 15;

/// Payload variants for array-typed enum query parameters sent as repeated
/// keys: every single value, every pair, then all values together.
#[must_use]
pub fn multi_enum_variants(endpoint: &EndpointDescriptor) -> Vec<Value> {
    let mut variants = Vec::new();
    for param in endpoint.params_in(ParamLocation::Query) {
        if !param.multi {
            continue;
        }
        let Some(values) = param.enum_values() else {
            continue;
        };
        let mut push = |combo: Vec<Value>| {
            let mut obj = Map::new();
            obj.insert(param.name.clone(), Value::Array(combo));
            variants.push(Value::Object(obj));
        };
        for v in values {
            push(vec![v.clone()]);
        }
        for (i, a) in values.iter().enumerate() {
            for b in &values[i + 1..] {
                push(vec![a.clone(), b.clone()]);
            }
        }
        if values.len() > 2 {
            push(values.clone());
        }
    }
    variants
}

/// Variant block, empty when the endpoint has no multi-value enums.
#[must_use]
pub fn render_variants(variants: &[Value]) -> String {
    if variants.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "Multi-value query variants (emit one happy_path case per line, payload verbatim):\n",
    );
    for v in variants {
        let _ = writeln!(out, "  - {v}");
    }
    out
}

/// Allowed payload keys for this endpoint.
#[must_use]
pub fn allowed_fields(endpoint: &EndpointDescriptor) -> Vec<String> {
    let mut fields: Vec<String> = endpoint
        .parameters
        .iter()
        .filter(|p| p.location != ParamLocation::Header)
        .map(|p| p.name.clone())
        .collect();
    for key in endpoint.body_properties().keys() {
        if !fields.contains(key) {
            fields.push(key.clone());
        }
    }
    fields
}

fn describe_endpoint(endpoint: &EndpointDescriptor, out: &mut String) {
    let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
    let _ = writeln!(out, "Endpoint: {} {}", endpoint.method, endpoint.path);
    let _ = writeln!(out, "Operation ID: {}", endpoint.operation_id);
    let _ = writeln!(out, "Summary: {}", or_na(&endpoint.summary));

    if !endpoint.parameters.is_empty() {
        out.push_str("\nParameters:\n");
        for p in &endpoint.parameters {
            let _ = write!(
                out,
                "  - {} ({}, type: {}",
                p.name,
                p.location.as_str(),
                p.schema_type()
            );
            if p.required {
                out.push_str(", REQUIRED");
            }
            if let Some(values) = p.enum_values() {
                let _ = write!(out, ", enum: {}", Value::Array(values.clone()));
            }
            if let Some(format) = p.schema.get("format").and_then(Value::as_str) {
                let _ = write!(out, ", format: {format}");
            }
            if p.multi {
                out.push_str(", multi-value");
            }
            let _ = writeln!(out, "): {}", or_na(&p.description));
        }
    }

    if let Some(target) = endpoint.body_target() {
        out.push_str("\nRequest Body:\n");
        let _ = writeln!(out, "  Content-Type: {}", target.content_type);
        let required = endpoint.required_body_fields();
        if !required.is_empty() {
            let _ = writeln!(
                out,
                "  REQUIRED FIELDS (must be included): {}",
                required.join(", ")
            );
        }
        let props = endpoint.body_properties();
        if !props.is_empty() {
            out.push_str("  Properties:\n");
            for (name, schema) in props.iter().take(MAX_LISTED_PROPERTIES) {
                let ty = schema.get("type").and_then(Value::as_str).unwrap_or("object");
                let _ = write!(out, "    - {name}: {ty}");
                if required.contains(name) {
                    out.push_str(" (REQUIRED)");
                }
                for key in ["enum", "format", "default"] {
                    if let Some(v) = schema.get(key) {
                        let _ = write!(out, " [{key}: {v}]");
                    }
                }
                out.push('\n');
            }
        }
        let _ = writeln!(out, "  Resolved schema: {}", target.schema);
    }

    if !endpoint.responses.is_empty() {
        out.push_str("\nResponses:\n");
        for r in &endpoint.responses {
            let _ = writeln!(out, "  - {}: {}", r.status, or_na(&r.description));
            if let Some(schema) = &r.schema {
                let _ = writeln!(out, "    Schema: {schema}");
            }
        }
    }
}

/// Full user prompt for one endpoint.
#[must_use]
pub fn build_prompt(endpoint: &EndpointDescriptor) -> String {
    let mut out = String::new();
    describe_endpoint(endpoint, &mut out);

    let allowed = allowed_fields(endpoint);
    out.push('\n');
    if allowed.is_empty() {
        out.push_str("Allowed payload fields: none (use an empty object)\n");
    } else {
        let _ = writeln!(
            out,
            "Allowed payload fields (use these names exactly, no others): {}",
            allowed.join(", ")
        );
    }

    let variants = render_variants(&multi_enum_variants(endpoint));
    if !variants.is_empty() {
        out.push('\n');
        out.push_str(&variants);
    }

    out.push_str(RULES);
    out
}

const RULES: &str = r#"
Rules:
1. happy_path: include every required field, only valid enum members, correct
   types and formats, values inside min/max and length limits. Path parameters
   are filled in by the runner; leave them out of the payload.
   Expected status: [200] or [201].
2. negative / validation: break exactly one thing per case (one missing
   required field, one wrong type, one invalid enum member or format).
   Expected status: [400, 422].
3. security: put SQL injection or XSS strings into fields, preferably fields
   whose enum or format they violate. Expected status: [400, 403, 422].
4. boundary / edge_case: probe minimum/maximum, minLength/maxLength,
   minItems/maxItems, empty strings and nulls.
   Expected status: [200, 201, 400, 422].

Each test case object has:
  "type": happy_path | negative | validation | security | boundary | edge_case
  "name": short descriptive name
  "payload": object (body fields, or query fields for GET/DELETE)
  "expected_status": array of status codes
  "description": what the case checks
  "assertions": array of {"type": status_code | response_body | response_header,
                "condition": equals | contains | exists | matches,
                "expected_value": ..., "field": "dot.path" (response_body only),
                "description": ...}

Return at least 5 diverse cases as one JSON array.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecResolver;
    use serde_json::json;

    fn spec() -> crate::spec::ResolvedSpec {
        SpecResolver::parse_document(json!({
            "swagger": "2.0",
            "info": {"title": "pets", "version": "1"},
            "paths": {
                "/pet/findByStatus": {"get": {
                    "operationId": "findPetsByStatus",
                    "parameters": [{
                        "name": "status", "in": "query", "required": true,
                        "type": "array", "collectionFormat": "multi",
                        "items": {"type": "string", "enum": ["available", "pending", "sold"]}
                    }],
                    "responses": {"200": {"description": "ok"}}
                }},
                "/pet": {"post": {
                    "operationId": "addPet",
                    "parameters": [{"name": "body", "in": "body", "required": true, "schema": {
                        "type": "object", "required": ["name"],
                        "properties": {"name": {"type": "string"}, "status": {"type": "string", "enum": ["available"]}}
                    }}],
                    "responses": {"405": {"description": "Invalid input"}}
                }}
            }
        }))
        .unwrap()
    }

    #[test]
    fn variants_cover_singles_pairs_and_all() {
        let spec = spec();
        let ep = spec.find_endpoint("GET", "/pet/findByStatus").unwrap();
        let rendered = render_variants(&multi_enum_variants(ep));
        insta::assert_snapshot!(rendered, @r#"
        Multi-value query variants (emit one happy_path case per line, payload verbatim):
          - {"status":["available"]}
          - {"status":["pending"]}
          - {"status":["sold"]}
          - {"status":["available","pending"]}
          - {"status":["available","sold"]}
          - {"status":["pending","sold"]}
          - {"status":["available","pending","sold"]}
        "#);
    }

    #[test]
    fn no_variants_without_multi_enum() {
        let spec = spec();
        let ep = spec.find_endpoint("POST", "/pet").unwrap();
        assert!(multi_enum_variants(ep).is_empty());
        assert!(!build_prompt(ep).contains("Multi-value"));
    }

    #[test]
    fn prompt_embeds_schema_and_whitelist() {
        let spec = spec();
        let ep = spec.find_endpoint("POST", "/pet").unwrap();
        let prompt = build_prompt(ep);
        assert!(prompt.starts_with("Endpoint: POST /pet\n"));
        assert!(prompt.contains("REQUIRED FIELDS (must be included): name"));
        assert!(prompt.contains("Allowed payload fields (use these names exactly, no others): name, status"));
        assert!(prompt.contains(r#"[enum: ["available"]]"#));
        assert!(prompt.contains("- 405: Invalid input"));
    }
}
