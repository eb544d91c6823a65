//! LLM-assisted test synthesis
//!
//! Builds a schema-grounded prompt per endpoint, sends it to a
//! [`TextGenerator`], extracts the returned case array, and repairs each
//! payload against the resolved schema before accepting it. Any endpoint that
//! yields no usable case fails the whole run: there is no fallback to the
//! heuristic generator once this mode is selected.

mod parse;
pub mod prompt;
mod provider;
mod repair;

use serde_json::{Map, Value};

use apiforge_core::{EndpointFilter, Fixtures, LlmConfig, TestCase, TestCategory};

use crate::datagen::{PayloadSynthesizer, uses_query_payload, value_to_param_string};
use crate::generate::{assertions_for, expected_status};
use crate::spec::{EndpointDescriptor, ParamLocation, ResolvedSpec};

pub use parse::{RawCase, category_of, extract_cases};
pub use provider::{ChatCompletionsClient, TextGenerator, default_endpoint};
pub use repair::{RepairReport, repair_payload};

/// Tag carried by every model-written case.
pub const LLM_TAG: &str = "llm";

/// Statuses assumed for rejection-seeking cases the model left unlabelled.
const REJECTION_DEFAULT: [u16; 2] = [400, 422];

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("Cannot parse LLM response: {0}")]
    Parse(String),
    #[error("LLM returned no usable test case for {0}")]
    Empty(String),
    #[error("Generation failed for {endpoint}: {source}")]
    Endpoint {
        endpoint: String,
        source: Box<GenerationError>,
    },
}

/// Test synthesizer backed by a text-generation provider.
pub struct LlmSynthesizer {
    provider: Box<dyn TextGenerator>,
    synth: PayloadSynthesizer,
}

impl LlmSynthesizer {
    #[must_use]
    pub fn new(provider: Box<dyn TextGenerator>) -> Self {
        Self {
            provider,
            synth: PayloadSynthesizer::new(),
        }
    }

    /// Synthesizer talking to the chat-completions endpoint of `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be configured (missing key).
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        Ok(Self::new(Box::new(ChatCompletionsClient::from_config(
            config,
        )?)))
    }

    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.synth = self.synth.with_fixtures(fixtures);
        self
    }

    /// Generate and repair cases for one endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails, the response holds no JSON array,
    /// or no case survives category filtering.
    pub fn generate(&self, endpoint: &EndpointDescriptor) -> Result<Vec<TestCase>, GenerationError> {
        let prompt = prompt::build_prompt(endpoint);
        let text = self.provider.complete(prompt::SYSTEM_PROMPT, &prompt)?;
        let values = extract_cases(&text)?;

        let mut cases = Vec::new();
        for value in &values {
            let raw = parse::raw_case(value);
            let Some(category) = raw.category else {
                tracing::debug!(
                    endpoint = %endpoint.label(),
                    label = ?value.get("type"),
                    "dropping case with unknown type"
                );
                continue;
            };
            if category.is_cross_endpoint() {
                tracing::debug!(endpoint = %endpoint.label(), %category, "dropping flow category");
                continue;
            }
            cases.push(self.accept(endpoint, category, raw));
        }

        if cases.is_empty() {
            return Err(GenerationError::Empty(endpoint.label()));
        }
        tracing::info!(
            endpoint = %endpoint.label(),
            returned = values.len(),
            accepted = cases.len(),
            "LLM cases accepted"
        );
        Ok(cases)
    }

    /// Generate for every selected endpoint, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Endpoint`] naming the endpoint that failed.
    pub fn generate_all(
        &self,
        spec: &ResolvedSpec,
        selected: Option<&[EndpointFilter]>,
        enabled: Option<&[TestCategory]>,
    ) -> Result<Vec<TestCase>, GenerationError> {
        let enabled = enabled.filter(|list| !list.is_empty());
        let mut cases = Vec::new();
        for endpoint in spec.select(selected.unwrap_or_default()) {
            let generated = self
                .generate(endpoint)
                .map_err(|e| GenerationError::Endpoint {
                    endpoint: endpoint.label(),
                    source: Box::new(e),
                })?;
            cases.extend(
                generated
                    .into_iter()
                    .filter(|c| enabled.is_none_or(|list| list.contains(&c.category))),
            );
        }
        Ok(cases)
    }

    fn accept(&self, endpoint: &EndpointDescriptor, category: TestCategory, raw: RawCase) -> TestCase {
        let mut payload = raw.payload;
        let report = repair_payload(&mut payload, category, endpoint, &self.synth);
        if !report.is_clean() {
            tracing::debug!(endpoint = %endpoint.label(), %category, ?report, "payload repaired");
        }

        let sample = self.synth.sample_payload(endpoint);
        let mut query = Map::new();
        if !uses_query_payload(&endpoint.method) {
            query = sample.query;
            for param in endpoint.params_in(ParamLocation::Query) {
                if let Some(v) = payload.remove(&param.name) {
                    query.insert(param.name.clone(), v);
                }
            }
            for field in &sample.file_fields {
                payload.remove(field);
            }
        }

        let expected = if !raw.expected_status.is_empty() {
            raw.expected_status
        } else if category.seeks_rejection() {
            REJECTION_DEFAULT.to_vec()
        } else {
            expected_status(endpoint)
        };
        let assertions = if raw.assertions.is_empty() {
            assertions_for(endpoint, &expected)
        } else {
            raw.assertions
        };
        let name = if raw.name.trim().is_empty() {
            format!("LLM {category}: {}", endpoint.operation_id)
        } else {
            raw.name
        };

        let mut case = TestCase::new(category, &endpoint.method, &endpoint.path, name)
            .with_operation_id(&endpoint.operation_id)
            .with_description(raw.description)
            .with_payload(Value::Object(payload))
            .with_query(Some(Value::Object(query)))
            .with_encoding(sample.encoding, sample.file_fields)
            .with_expected_status(expected)
            .with_assertions(assertions)
            .with_tag(LLM_TAG);
        for (name, value) in &sample.headers {
            case.headers.insert(name.clone(), value_to_param_string(value));
        }
        case
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecResolver;
    use apiforge_core::AssertionKind;
    use serde_json::json;
    use std::cell::RefCell;

    struct Canned {
        reply: Result<String, String>,
        prompts: RefCell<Vec<String>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for Canned {
        fn complete(&self, _system: &str, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(GenerationError::Provider)
        }
    }

    impl TextGenerator for std::rc::Rc<Canned> {
        fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
            self.as_ref().complete(system, prompt)
        }
    }

    fn spec() -> ResolvedSpec {
        SpecResolver::parse_document(json!({
            "openapi": "3.0.0",
            "info": {"title": "pets", "version": "1"},
            "paths": {
                "/pet": {"post": {
                    "operationId": "addPet",
                    "parameters": [{"name": "dryRun", "in": "query", "schema": {"type": "boolean"}}],
                    "requestBody": {"content": {"application/json": {"schema": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "status": {"type": "string", "enum": ["available", "sold"]}
                        }
                    }}}},
                    "responses": {
                        "201": {"description": "created", "content": {"application/json": {"schema": {
                            "type": "object", "required": ["id"], "properties": {"id": {"type": "integer"}}
                        }}}},
                        "405": {"description": "invalid"}
                    }
                }},
                "/store/order": {"get": {
                    "operationId": "listOrders",
                    "responses": {"200": {"description": "ok"}}
                }}
            }
        }))
        .unwrap()
    }

    // ── Acceptance ──

    #[test]
    fn accepted_cases_are_repaired_and_tagged() {
        let reply = r#"```json
[
  {"type": "happy_path", "name": "create", "payload": {"name": "Rex", "status": "gone", "dryRun": true}},
  {"type": "edge_case", "name": "long name", "payload": {"name": "xxxxxxxx"}, "expected_status": [201, 400]},
  {"type": "crud", "name": "flow", "payload": {}},
  {"type": "astrology", "name": "stars", "payload": {}},
  {"type": "negative", "name": "missing name", "payload": {"status": "sold"}},
]
```"#;
        let spec = spec();
        let ep = spec.find_endpoint("POST", "/pet").unwrap();
        let synth = LlmSynthesizer::new(Box::new(Canned::ok(reply)));
        let cases = synth.generate(ep).unwrap();

        let categories: Vec<_> = cases.iter().map(|c| c.category).collect();
        assert_eq!(
            categories,
            [TestCategory::HappyPath, TestCategory::Boundary, TestCategory::Negative]
        );
        assert!(cases.iter().all(|c| c.tags == [LLM_TAG]));

        let happy = &cases[0];
        assert_eq!(happy.payload, json!({"name": "Rex", "status": "available"}));
        assert_eq!(happy.query, Some(json!({"dryRun": true})));
        assert_eq!(happy.expected_status, vec![201]);
        assert!(happy
            .assertions
            .iter()
            .any(|a| a.kind == AssertionKind::ResponseBody && a.field.as_deref() == Some("id")));

        assert_eq!(cases[1].expected_status, vec![201, 400]);
        assert_eq!(cases[2].expected_status, vec![400, 422]);
    }

    #[test]
    fn prompt_reaches_provider() {
        let canned = std::rc::Rc::new(Canned::ok(r#"[{"type": "happy_path", "name": "list"}]"#));
        let spec = spec();
        let ep = spec.find_endpoint("GET", "/store/order").unwrap();
        let synth = LlmSynthesizer::new(Box::new(std::rc::Rc::clone(&canned)));
        let cases = synth.generate(ep).unwrap();
        assert_eq!(cases.len(), 1);
        let prompts = canned.prompts.borrow();
        assert!(prompts[0].starts_with("Endpoint: GET /store/order"));
    }

    // ── Failure propagation ──

    #[test]
    fn only_unusable_cases_is_an_error() {
        let spec = spec();
        let ep = spec.find_endpoint("GET", "/store/order").unwrap();
        let synth = LlmSynthesizer::new(Box::new(Canned::ok(r#"[{"type": "crud"}]"#)));
        assert!(matches!(synth.generate(ep), Err(GenerationError::Empty(_))));
    }

    #[test]
    fn provider_failure_names_the_endpoint() {
        let spec = spec();
        let synth = LlmSynthesizer::new(Box::new(Canned {
            reply: Err("503".into()),
            prompts: RefCell::new(Vec::new()),
        }));
        let err = synth.generate_all(&spec, None, None).unwrap_err();
        match err {
            GenerationError::Endpoint { endpoint, source } => {
                assert_eq!(endpoint, "POST /pet");
                assert!(matches!(*source, GenerationError::Provider(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn enabled_categories_filter_results() {
        let reply = r#"[{"type": "happy_path", "name": "a"}, {"type": "security", "name": "b"}]"#;
        let spec = spec();
        let synth = LlmSynthesizer::new(Box::new(Canned::ok(reply)));
        let cases = synth
            .generate_all(&spec, None, Some(&[TestCategory::Security]))
            .unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.category == TestCategory::Security));
    }
}
