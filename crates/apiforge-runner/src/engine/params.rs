//! Path placeholder resolution and URL assembly

use std::collections::BTreeMap;

use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};

use crate::datagen::{random_suffix, value_to_param_string};

use super::ExecutionError;
use super::context::ExecutionContext;

/// Where a path value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Pinned,
    Context,
    Payload,
    Synthetic,
}

/// Placeholder names in template order: `/pets/{petId}` → `["petId"]`.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    template_pattern()
        .map(|re| {
            re.captures_iter(template)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn template_pattern() -> Option<Regex> {
    Regex::new(r"\{([^{}/]+)\}").ok()
}

/// Value for a placeholder nothing else supplied.
///
/// Identifier-like names get a positive number derived from the current
/// time; `username`-like names a random suffix; everything else a plain
/// placeholder string.
pub fn synthetic_value(name: &str, rng: &mut impl Rng) -> String {
    let lower = name.to_ascii_lowercase();
    if ["id", "num", "code", "ref"].iter().any(|w| lower.contains(w)) {
        let millis = chrono::Utc::now().timestamp_millis().unsigned_abs();
        return (millis % 1_000_000 + 1).to_string();
    }
    if lower.contains("username") || lower.contains("name") {
        return format!("testuser_{}", random_suffix(rng, 6));
    }
    if lower.contains("email") {
        return format!("test_{}@example.com", random_suffix(rng, 6));
    }
    if lower.contains("status") {
        return "available".to_string();
    }
    format!("value_{}", random_suffix(rng, 6))
}

/// Resolve every placeholder of `template`.
///
/// Priority: pinned override, then context, then `payload`, then a
/// synthetic value. A payload value used for the path is removed from
/// `payload` when `consume` is set.
pub fn resolve_path_values(
    template: &str,
    resource: &str,
    pinned: &BTreeMap<String, String>,
    context: &ExecutionContext,
    payload: &mut Map<String, Value>,
    consume: bool,
    rng: &mut impl Rng,
) -> BTreeMap<String, (String, ValueSource)> {
    let mut values = BTreeMap::new();
    for name in placeholders(template) {
        let resolved = if let Some(v) = pinned.get(&name) {
            (v.clone(), ValueSource::Pinned)
        } else if let Some(v) = context.lookup_path_param(&name, resource) {
            (v.to_string(), ValueSource::Context)
        } else if let Some(v) = payload
            .get(&name)
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
            .map(value_to_param_string)
        {
            if consume {
                payload.remove(&name);
            }
            (v, ValueSource::Payload)
        } else {
            (synthetic_value(&name, rng), ValueSource::Synthetic)
        };
        values.insert(name, resolved);
    }
    values
}

/// `base` joined with `template`, each segment percent-encoded after
/// substitution.
///
/// # Errors
///
/// Returns error if `base` is not an absolute http(s) URL.
pub fn build_url(
    base: &str,
    template: &str,
    values: &BTreeMap<String, (String, ValueSource)>,
) -> Result<reqwest::Url, ExecutionError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| ExecutionError::InvalidRequest(format!("base URL {base}: {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ExecutionError::InvalidRequest(format!("base URL {base} cannot hold a path")))?;
        segments.pop_if_empty();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let mut segment = raw.to_string();
            for (name, (value, _)) in values {
                segment = segment.replace(&format!("{{{name}}}"), value);
            }
            segments.push(&segment);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    // ── Resolution priority ──

    #[test]
    fn context_beats_payload() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("id", "42");
        let mut payload = json!({"id": 7}).as_object().cloned().unwrap();
        let values = resolve_path_values(
            "/items/{id}",
            "items",
            &BTreeMap::new(),
            &ctx,
            &mut payload,
            true,
            &mut rng(),
        );
        assert_eq!(values["id"], ("42".to_string(), ValueSource::Context));
        assert!(payload.contains_key("id"));
    }

    #[test]
    fn pinned_beats_context() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("id", "42");
        let pinned = BTreeMap::from([("petId".to_string(), "../../etc/passwd".to_string())]);
        let values = resolve_path_values(
            "/pet/{petId}",
            "pet",
            &pinned,
            &ctx,
            &mut Map::new(),
            true,
            &mut rng(),
        );
        assert_eq!(values["petId"].1, ValueSource::Pinned);
    }

    #[test]
    fn payload_value_is_consumed_for_query_methods() {
        let mut payload = json!({"orderId": 9, "limit": 1}).as_object().cloned().unwrap();
        let values = resolve_path_values(
            "/store/order/{orderId}",
            "store",
            &BTreeMap::new(),
            &ExecutionContext::new(),
            &mut payload,
            true,
            &mut rng(),
        );
        assert_eq!(values["orderId"], ("9".to_string(), ValueSource::Payload));
        assert!(!payload.contains_key("orderId"));
    }

    #[test]
    fn synthetic_values_by_name() {
        let mut r = rng();
        let id: u64 = synthetic_value("petId", &mut r).parse().unwrap();
        assert!(id >= 1);
        assert!(synthetic_value("username", &mut r).starts_with("testuser_"));
        assert!(synthetic_value("color", &mut r).starts_with("value_"));
        assert!(!synthetic_value("color", &mut r).is_empty());
    }

    // ── URL assembly ──

    #[test]
    fn segments_are_encoded_and_base_path_kept() {
        let values = BTreeMap::from([(
            "petId".to_string(),
            ("../../etc/passwd".to_string(), ValueSource::Pinned),
        )]);
        let url = build_url("http://localhost:8080/api/v3/", "/pet/{petId}", &values).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v3/pet/..%2F..%2Fetc%2Fpasswd"
        );
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(placeholders("/a/{x}/b/{y}.json"), ["x", "y"]);
        assert!(placeholders("/plain").is_empty());
    }
}
