//! Payload repair for model-written cases
//!
//! Every case loses field names the endpoint does not declare. A payload
//! with nothing recognizable left is replaced by the synthesized sample.
//! Happy-path payloads additionally get missing required fields back-filled,
//! invalid enum members replaced, and a final JSON Schema check.

use serde_json::{Map, Value};

use apiforge_core::{BodyEncoding, TestCategory};

use super::prompt::allowed_fields;
use crate::datagen::{PayloadSynthesizer, biased_enum, uses_query_payload};
use crate::spec::{EndpointDescriptor, ParamLocation};

/// What repair changed, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub stripped: Vec<String>,
    pub filled: Vec<String>,
    pub enums_fixed: Vec<String>,
    pub regenerated: bool,
}

impl RepairReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stripped.is_empty()
            && self.filled.is_empty()
            && self.enums_fixed.is_empty()
            && !self.regenerated
    }
}

fn sample_object(synth: &PayloadSynthesizer, endpoint: &EndpointDescriptor) -> Map<String, Value> {
    match synth.sample_payload(endpoint).payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Schema of a payload field: a body property or a parameter.
fn field_schema(endpoint: &EndpointDescriptor, name: &str) -> Option<Value> {
    if let Some(schema) = endpoint.body_properties().get(name) {
        return Some(schema.clone());
    }
    endpoint
        .parameters
        .iter()
        .find(|p| p.name == name && p.location != ParamLocation::Header)
        .map(|p| p.schema.clone())
}

fn enum_members(schema: &Value) -> Option<&Vec<Value>> {
    schema
        .get("enum")
        .or_else(|| schema.get("items").and_then(|i| i.get("enum")))
        .and_then(Value::as_array)
}

/// Fields a happy-path payload must carry.
fn required_payload_fields(endpoint: &EndpointDescriptor) -> Vec<String> {
    if uses_query_payload(&endpoint.method) {
        endpoint
            .params_in(ParamLocation::Query)
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect()
    } else {
        endpoint.required_body_fields()
    }
}

/// Free-form bodies (no declared properties) accept any field name.
fn accepts_any_field(endpoint: &EndpointDescriptor) -> bool {
    !uses_query_payload(&endpoint.method)
        && endpoint.body_target().is_some()
        && endpoint.body_properties().is_empty()
}

fn fix_enum(value: &Value, members: &[Value]) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let kept: Vec<Value> = items.iter().filter(|v| members.contains(v)).cloned().collect();
            if kept.len() == items.len() && !kept.is_empty() {
                return None;
            }
            if kept.is_empty() {
                biased_enum(members).map(|v| Value::Array(vec![v]))
            } else {
                Some(Value::Array(kept))
            }
        }
        other if members.contains(other) => None,
        _ => biased_enum(members),
    }
}

fn body_is_schema_valid(endpoint: &EndpointDescriptor, payload: &Map<String, Value>) -> bool {
    let Some(target) = endpoint.body_target() else {
        return true;
    };
    if target.encoding != BodyEncoding::Json {
        return true;
    }
    match jsonschema::validator_for(target.schema) {
        Ok(validator) => {
            let instance = Value::Object(payload.clone());
            let errors: Vec<String> = validator
                .iter_errors(&instance)
                .map(|e| e.to_string())
                .take(3)
                .collect();
            if !errors.is_empty() {
                tracing::debug!(endpoint = %endpoint.label(), ?errors, "payload violates body schema");
            }
            errors.is_empty()
        }
        // Schemas the validator cannot compile are not held against the payload.
        Err(e) => {
            tracing::debug!(endpoint = %endpoint.label(), error = %e, "body schema not compilable");
            true
        }
    }
}

/// Repair `payload` in place for a case of `category` against `endpoint`.
pub fn repair_payload(
    payload: &mut Map<String, Value>,
    category: TestCategory,
    endpoint: &EndpointDescriptor,
    synth: &PayloadSynthesizer,
) -> RepairReport {
    let mut report = RepairReport::default();

    if !accepts_any_field(endpoint) {
        let allowed = allowed_fields(endpoint);
        let had_fields = !payload.is_empty();
        payload.retain(|key, _| {
            let keep = allowed.contains(key);
            if !keep {
                report.stripped.push(key.clone());
            }
            keep
        });
        if had_fields && payload.is_empty() {
            *payload = sample_object(synth, endpoint);
            report.regenerated = true;
            return report;
        }
    }

    if category != TestCategory::HappyPath {
        return report;
    }

    let required = required_payload_fields(endpoint);
    let missing: Vec<&String> = required.iter().filter(|f| !payload.contains_key(*f)).collect();
    if !missing.is_empty() {
        let sample = sample_object(synth, endpoint);
        for field in missing {
            let value = sample.get(field).cloned().or_else(|| {
                field_schema(endpoint, field).map(|s| synth.value_for(&s, Some(field)))
            });
            if let Some(value) = value {
                payload.insert(field.clone(), value);
                report.filled.push(field.clone());
            }
        }
    }

    for (key, value) in payload.iter_mut() {
        let Some(schema) = field_schema(endpoint, key) else {
            continue;
        };
        let Some(members) = enum_members(&schema) else {
            continue;
        };
        if let Some(fixed) = fix_enum(value, members) {
            *value = fixed;
            report.enums_fixed.push(key.clone());
        }
    }

    if !uses_query_payload(&endpoint.method) && !body_is_schema_valid(endpoint, payload) {
        *payload = sample_object(synth, endpoint);
        report.regenerated = true;
    }

    report
}
