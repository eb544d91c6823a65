//! Values captured from earlier responses for later path substitution
//!
//! Key namespace:
//! - identifier fields (`id`, `*Id`, `*_id`) under their literal name and
//!   lower-cased, plus the aliases `id`, `created_id` and `<resource>_id`
//! - [`CAPTURED_FIELDS`] under their literal name and lower-cased
//!
//! Inside a flow the captures of the latest step also sit in a step scope
//! that is consulted before the suite-wide keys.

use std::collections::BTreeMap;

use serde_json::Value;

/// Non-identifier fields worth carrying between steps.
const CAPTURED_FIELDS: [&str; 4] = ["username", "email", "token", "access_token"];

/// Envelope keys unwrapped once when the top level has no identifier.
const ENVELOPES: [&str; 2] = ["data", "result"];

fn is_identifier(key: &str) -> bool {
    key == "id" || key.ends_with("Id") || key.ends_with("_id") || key.ends_with("ID")
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Key-value store scoped to one engine instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    values: BTreeMap<String, String>,
    step: Option<BTreeMap<String, String>>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.step = None;
    }

    /// Open a step scope for a multi-step flow.
    pub fn begin_flow(&mut self) {
        self.step = Some(BTreeMap::new());
    }

    /// Drop the step scope. Suite-wide keys are kept.
    pub fn end_flow(&mut self) {
        self.step = None;
    }

    fn store(&mut self, key: &str, value: &str) {
        let lower = key.to_ascii_lowercase();
        for map in std::iter::once(&mut self.values).chain(self.step.as_mut()) {
            map.insert(key.to_string(), value.to_string());
            if lower != key {
                map.insert(lower.clone(), value.to_string());
            }
        }
    }

    /// Merge identifiers and credentials from a successful response body.
    ///
    /// Only object bodies are read; a listing's elements are existing
    /// records, not the one this request touched. Returns the number of
    /// fields captured.
    pub fn record_response(&mut self, resource: &str, body: &Value) -> usize {
        let Value::Object(object) = body else {
            return 0;
        };
        let object = if object.keys().any(|k| is_identifier(k)) {
            object
        } else {
            ENVELOPES
                .iter()
                .find_map(|k| object.get(*k).and_then(Value::as_object))
                .unwrap_or(object)
        };

        if let Some(step) = self.step.as_mut() {
            step.clear();
        }
        let mut captured = 0;
        let mut primary: Option<String> = None;
        for (key, value) in object {
            let Some(text) = scalar_string(value) else {
                continue;
            };
            if is_identifier(key) {
                self.store(key, &text);
                captured += 1;
                if key == "id" || primary.is_none() {
                    primary = Some(text);
                }
            } else if CAPTURED_FIELDS.contains(&key.as_str()) {
                self.store(key, &text);
                captured += 1;
            }
        }
        if let Some(id) = primary {
            self.store("id", &id);
            self.store("created_id", &id);
            if !resource.is_empty() {
                self.store(&format!("{}_id", resource.to_ascii_lowercase()), &id);
            }
        }
        if captured > 0 {
            tracing::debug!(resource, captured, "context updated from response");
        }
        captured
    }

    /// Value for the path placeholder `name` of an endpoint under `resource`.
    ///
    /// Tries the literal name, its lower-cased form, then for identifier
    /// placeholders `<resource>_id`. The step scope is searched before the
    /// suite-wide keys; `id` is the last resort.
    #[must_use]
    pub fn lookup_path_param(&self, name: &str, resource: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        let mut keys = vec![name.to_string(), lower.clone()];
        if lower.contains("id") {
            keys.push(format!("{}_id", resource.to_ascii_lowercase()));
        }
        let scopes = self.step.iter().chain(std::iter::once(&self.values));
        for scope in scopes {
            if let Some(v) = keys.iter().find_map(|k| scope.get(k)) {
                return Some(v.as_str());
            }
        }
        if lower.contains("id") {
            self.get("id")
        } else {
            None
        }
    }
}
