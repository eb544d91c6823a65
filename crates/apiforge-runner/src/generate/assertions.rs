//! Expected statuses and response assertions derived from declared responses

use serde_json::Value;

use apiforge_core::Assertion;

use crate::datagen::schema_type;
use crate::spec::{EndpointDescriptor, object_properties, required_fields};

/// Body properties asserted per response.
const MAX_BODY_ASSERTIONS: usize = 3;

/// Declared 2xx codes, else a per-method default.
#[must_use]
pub fn expected_status(endpoint: &EndpointDescriptor) -> Vec<u16> {
    let declared: Vec<u16> = endpoint
        .declared_statuses()
        .into_iter()
        .filter(|s| (200..300).contains(s))
        .collect();
    if !declared.is_empty() {
        return declared;
    }
    match endpoint.method.as_str() {
        "POST" => vec![200, 201],
        "DELETE" => vec![200, 204],
        _ => vec![200],
    }
}

/// Assertions for a case expecting `expected`.
///
/// A `status_code equals` is only emitted for a single expected status;
/// with several acceptable codes the status set check already covers it.
#[must_use]
pub fn assertions_for(endpoint: &EndpointDescriptor, expected: &[u16]) -> Vec<Assertion> {
    let mut out = Vec::new();

    for &status in expected {
        let response = endpoint.response(status);
        if expected.len() == 1 {
            let label = response
                .map(|r| r.description.as_str())
                .filter(|d| !d.is_empty())
                .map_or_else(|| format!("Status {status} response"), str::to_string);
            out.push(Assertion::status_equals(
                status,
                format!("Verify response status code is {status} ({label})"),
            ));
        }
        if let Some(schema) = response.and_then(|r| r.schema.as_ref()) {
            out.extend(body_assertions(schema));
        }
    }

    for response in &endpoint.responses {
        let Some(code) = response.code() else {
            continue;
        };
        if code >= 400 && !expected.contains(&code) {
            let desc = if response.description.is_empty() {
                format!("Error {code}")
            } else {
                response.description.clone()
            };
            out.push(Assertion::status_not_equals(
                code,
                format!("Verify response is not {code} ({desc})"),
            ));
        }
    }

    dedup(out)
}

fn body_assertions(schema: &Value) -> Vec<Assertion> {
    match schema_type(schema) {
        Some("array") => {
            let mut out = vec![Assertion::body_exists("", "Verify response body exists")];
            if let Some(items) = schema.get("items") {
                if let Some((first, _)) = object_properties(items).into_iter().next() {
                    out.push(Assertion::body_exists(
                        format!("0.{first}"),
                        format!("Verify response array items have {first} property"),
                    ));
                }
            }
            out
        }
        _ => {
            let required = required_fields(schema);
            if !required.is_empty() {
                return required
                    .into_iter()
                    .take(MAX_BODY_ASSERTIONS)
                    .map(|field| {
                        let desc = format!("Verify required property {field} exists in response");
                        Assertion::body_exists(field, desc)
                    })
                    .collect();
            }
            match object_properties(schema).into_iter().next() {
                Some((first, _)) => {
                    let desc = format!("Verify response has {first} property");
                    vec![Assertion::body_exists(first, desc)]
                }
                None => vec![Assertion::body_exists("", "Verify response body exists")],
            }
        }
    }
}

fn dedup(assertions: Vec<Assertion>) -> Vec<Assertion> {
    let mut out: Vec<Assertion> = Vec::with_capacity(assertions.len());
    for a in assertions {
        let duplicate = out.iter().any(|b| {
            b.kind == a.kind
                && b.condition == a.condition
                && b.field == a.field
                && b.expected_value == a.expected_value
        });
        if !duplicate {
            out.push(a);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecResolver;
    use apiforge_core::{AssertionKind, Operator};
    use serde_json::json;

    fn spec() -> crate::spec::ResolvedSpec {
        SpecResolver::parse_document(json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/pets": {
                    "get": {"responses": {
                        "200": {"description": "list", "content": {"application/json": {"schema": {
                            "type": "array",
                            "items": {"type": "object", "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}}
                        }}}},
                        "400": {"description": "bad"}
                    }},
                    "post": {"responses": {
                        "default": {"description": "whatever"}
                    }}
                },
                "/pets/{id}": {
                    "get": {"responses": {
                        "200": {"description": "one", "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["id", "name", "tag", "age"],
                            "properties": {"id": {"type": "integer"}}
                        }}}},
                        "404": {"description": ""}
                    }},
                    "delete": {"responses": {}}
                }
            }
        }))
        .unwrap()
    }

    // ── expected_status ──

    #[test]
    fn declared_success_codes_win() {
        let spec = spec();
        assert_eq!(expected_status(spec.find_endpoint("GET", "/pets").unwrap()), vec![200]);
    }

    #[test]
    fn method_defaults_without_declared_success() {
        let spec = spec();
        assert_eq!(
            expected_status(spec.find_endpoint("POST", "/pets").unwrap()),
            vec![200, 201]
        );
        assert_eq!(
            expected_status(spec.find_endpoint("DELETE", "/pets/{id}").unwrap()),
            vec![200, 204]
        );
    }

    // ── assertions_for ──

    #[test]
    fn array_response_checks_first_item_property() {
        let spec = spec();
        let a = assertions_for(spec.find_endpoint("GET", "/pets").unwrap(), &[200]);
        assert_eq!(a[0].kind, AssertionKind::StatusCode);
        assert_eq!(a[0].expected_value, json!(200));
        assert!(a.iter().any(|x| x.field.as_deref() == Some("0.id")));
        let not_400 = a.iter().find(|x| x.condition == Operator::NotEquals).unwrap();
        assert_eq!(not_400.expected_value, json!(400));
    }

    #[test]
    fn object_response_checks_at_most_three_required() {
        let spec = spec();
        let a = assertions_for(spec.find_endpoint("GET", "/pets/{id}").unwrap(), &[200]);
        let fields: Vec<_> = a.iter().filter_map(|x| x.field.as_deref()).collect();
        assert_eq!(fields, vec!["id", "name", "tag"]);
        assert!(a.iter().any(|x| x.description.contains("Error 404")));
    }

    #[test]
    fn multiple_expected_statuses_skip_equals() {
        let spec = spec();
        let a = assertions_for(spec.find_endpoint("DELETE", "/pets/{id}").unwrap(), &[200, 204]);
        assert!(a.iter().all(|x| x.condition != Operator::Equals));
    }

    #[test]
    fn expected_error_codes_are_not_negated() {
        let spec = spec();
        let a = assertions_for(spec.find_endpoint("GET", "/pets").unwrap(), &[400, 422]);
        assert!(a.iter().all(|x| x.condition != Operator::NotEquals));
    }
}
