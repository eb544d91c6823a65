//! Execution engine against a local HTTP server.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tiny_http::{Header, Response, Server};

use apiforge_core::{Assertion, FlowStep, Severity, TestCase, TestCategory, Verdict};
use apiforge_runner::engine::{AuthProfile, OAuth2Credentials};
use apiforge_runner::{
    ExecutionEngine, HeuristicGenerator, ProgressSink, ReplayOverrides, SpecResolver, SuiteStatus,
};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Seen {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct MockServer {
    base_url: String,
    log: Arc<Mutex<Vec<Seen>>>,
}

impl MockServer {
    fn seen(&self) -> Vec<Seen> {
        self.log.lock().unwrap().clone()
    }
}

/// Serve JSON responses from `handler` on an ephemeral port until the
/// test process exits.
fn serve(mut handler: impl FnMut(&Seen) -> (u16, Value) + Send + 'static) -> MockServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let thread_log = Arc::clone(&log);
    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let seen = Seen {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| {
                        (
                            h.field.as_str().as_str().to_ascii_lowercase(),
                            h.value.as_str().to_string(),
                        )
                    })
                    .collect(),
                body,
            };
            let (status, json) = handler(&seen);
            thread_log.lock().unwrap().push(seen);
            let response = Response::from_string(json.to_string())
                .with_status_code(status)
                .with_header(
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
                );
            let _ = request.respond(response);
        }
    });
    MockServer {
        base_url: format!("http://{addr}"),
        log,
    }
}

fn engine(server: &MockServer) -> ExecutionEngine {
    ExecutionEngine::new(server.base_url.clone())
        .unwrap()
        .with_timeout(Duration::from_secs(5))
        .with_seed(42)
}

// ── Single-request verdicts ──

#[test]
fn security_case_rejected_with_422_passes() {
    let server = serve(|_| (422, json!({"error": "invalid"})));
    let case = TestCase::new(TestCategory::Security, "POST", "/login", "SQL injection")
        .with_payload(json!({"username": "' OR '1'='1", "password": "x"}))
        .with_expected_status(vec![400, 422]);

    let result = engine(&server).execute(&case);

    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(result.actual_status, Some(422));
    assert!(!result.security_finding);
    let seen = server.seen();
    assert_eq!(seen[0].method, "POST");
    assert!(seen[0].body.contains("' OR '1'='1"));
}

#[test]
fn security_case_accepted_is_a_high_severity_finding() {
    let server = serve(|_| (200, json!({"token": "abc"})));
    let case = TestCase::new(TestCategory::Security, "POST", "/login", "SQL injection")
        .with_payload(json!({"username": "admin'--"}))
        .with_expected_status(vec![400, 422]);

    let result = engine(&server).execute(&case);

    assert_eq!(result.verdict, Verdict::Failed);
    assert!(result.security_finding);
    assert_eq!(result.severity, Some(Severity::High));
    assert!(result.error.unwrap().contains("Security issue"));
    assert_eq!(result.trace.len(), 1);
    assert_eq!(result.trace[0].status_code(), Some(200));
}

#[test]
fn happy_path_with_failing_assertion_fails() {
    let server = serve(|_| (200, json!({"name": "Rex"})));
    let case = TestCase::new(TestCategory::HappyPath, "GET", "/pets/1", "get pet")
        .with_assertions(vec![
            Assertion::status_equals(200, ""),
            Assertion::body_exists("id", ""),
        ]);

    let result = engine(&server).execute(&case);

    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(result.assertion_results.len(), 2);
    assert!(result.assertion_results[0].passed);
    assert!(!result.assertion_results[1].passed);
}

#[test]
fn query_method_sends_payload_as_query_string() {
    let server = serve(|_| (200, json!([])));
    let case = TestCase::new(TestCategory::HappyPath, "GET", "/pet/findByStatus", "find")
        .with_payload(json!({"status": "sold"}));

    let result = engine(&server).execute(&case);

    assert_eq!(result.verdict, Verdict::Passed);
    let seen = server.seen();
    assert_eq!(seen[0].url, "/pet/findByStatus?status=sold");
    assert!(seen[0].body.is_empty());
}

// ── Execution context ──

#[test]
fn captured_id_beats_payload_value_for_path() {
    let server = serve(|seen| match seen.method.as_str() {
        "POST" => (201, json!({"id": 42, "name": "widget"})),
        _ => (204, json!({})),
    });
    let cases = vec![
        TestCase::new(TestCategory::HappyPath, "POST", "/items", "create")
            .with_payload(json!({"name": "widget"}))
            .with_expected_status(vec![201]),
        TestCase::new(TestCategory::HappyPath, "DELETE", "/items/{id}", "delete")
            .with_payload(json!({"id": 7}))
            .with_expected_status(vec![204]),
    ];

    let mut engine = engine(&server);
    let results = engine.execute_suite(&cases);

    assert!(results.iter().all(|r| r.verdict == Verdict::Passed));
    assert_eq!(engine.context().get("items_id"), Some("42"));
    let delete = &server.seen()[1];
    assert!(delete.url.starts_with("/items/42"), "{}", delete.url);
}

#[test]
fn crud_flow_carries_created_id_through_every_step() {
    let server = serve(|seen| {
        let path = seen.url.split('?').next().unwrap_or_default();
        match (seen.method.as_str(), path) {
            ("POST", "/pet") => (200, json!({"id": 101, "name": "doggie"})),
            ("GET" | "PUT", "/pet/101") => (200, json!({"id": 101, "name": "doggie"})),
            ("DELETE", "/pet/101") => (200, json!({"message": "deleted"})),
            _ => (404, json!({"message": "not found"})),
        }
    });
    let document = json!({
        "openapi": "3.0.0",
        "info": {"title": "Petstore", "version": "1"},
        "paths": {
            "/pet": {
                "post": {
                    "operationId": "addPet",
                    "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}},
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/pet/{petId}": {
                "parameters": [{"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}],
                "get": {"operationId": "getPetById", "responses": {"200": {"description": "ok"}}},
                "put": {
                    "operationId": "updatePet",
                    "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}},
                    "responses": {"200": {"description": "ok"}}
                },
                "delete": {"operationId": "deletePet", "responses": {"200": {"description": "ok"}}}
            }
        },
        "components": {"schemas": {"Pet": {
            "type": "object",
            "required": ["name"],
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
        }}}
    });
    let spec = SpecResolver::parse_document(document).unwrap();
    let cases = HeuristicGenerator::new(&spec).generate_all_tests(None, Some(&[TestCategory::Crud]));
    assert_eq!(cases.len(), 1);

    let result = engine(&server).execute(&cases[0]);

    assert_eq!(result.verdict, Verdict::Passed, "{:?}", result.error);
    assert_eq!(result.trace.len(), 4);
    for step in &result.trace[1..] {
        assert!(step.request.url.ends_with("/pet/101"), "{}", step.request.url);
    }
}

#[test]
fn generated_create_then_delete_uses_returned_pet_id() {
    let server = serve(|seen| match (seen.method.as_str(), seen.url.as_str()) {
        ("POST", "/pet") => (200, json!({"petId": 555, "name": "doggie"})),
        ("DELETE", url) if url.starts_with("/pet/555") => (200, json!({})),
        _ => (404, json!({})),
    });
    let document = json!({
        "openapi": "3.0.0",
        "info": {"title": "Petstore", "version": "1"},
        "paths": {
            "/pet": {"post": {
                "requestBody": {"content": {"application/json": {"schema": {
                    "type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}
                }}}},
                "responses": {"200": {"description": "ok"}}
            }},
            "/pet/{petId}": {"delete": {
                "parameters": [{"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}],
                "responses": {"200": {"description": "ok"}}
            }}
        }
    });
    let spec = SpecResolver::parse_document(document).unwrap();
    let cases = HeuristicGenerator::new(&spec)
        .generate_all_tests(None, Some(&[TestCategory::HappyPath]));
    let flow = cases.iter().find(|c| c.is_flow()).unwrap();
    assert_eq!(flow.flow[1].endpoint, "/pet/{petId}");

    let mut engine = engine(&server);
    let result = engine.execute(flow);

    assert_eq!(result.verdict, Verdict::Passed, "{:?}", result.error);
    assert_eq!(engine.context().get("petId"), Some("555"));
    let urls: Vec<String> = server.seen().into_iter().map(|s| s.url).collect();
    assert!(urls[1].starts_with("/pet/555"), "{urls:?}");
}

#[test]
fn flow_step_failure_names_the_step() {
    let server = serve(|seen| match seen.method.as_str() {
        "POST" => (201, json!({"id": 5})),
        _ => (404, json!({})),
    });
    let case = TestCase::new(TestCategory::E2e, "DELETE", "/widgets/{id}", "Delete widget after create")
        .with_flow(vec![
            FlowStep::new("POST", "/widgets", json!({"name": "w"})).with_description("Create widget"),
            FlowStep::new("DELETE", "/widgets/{id}", json!({})).with_description("Delete widget"),
        ]);

    let result = engine(&server).execute(&case);

    assert_eq!(result.verdict, Verdict::Failed);
    assert!(result.error.unwrap().contains("Step 2 (DELETE /widgets/{id}) returned 404"));
    assert_eq!(server.seen()[1].url, "/widgets/5");
}

#[test]
fn flow_prefers_its_own_create_over_earlier_case_ids() {
    let server = serve(|seen| match (seen.method.as_str(), seen.url.as_str()) {
        ("POST", "/store/order") => (200, json!({"id": 5, "petId": 999})),
        ("POST", "/pet") => (200, json!({"id": 77, "name": "doggie"})),
        ("DELETE", "/pet/77") => (200, json!({})),
        _ => (404, json!({})),
    });
    let order = TestCase::new(TestCategory::HappyPath, "POST", "/store/order", "Place order")
        .with_payload(json!({"petId": 999, "quantity": 1}));
    let flow = TestCase::new(TestCategory::E2e, "DELETE", "/pet/{petId}", "Delete pet after create")
        .with_flow(vec![
            FlowStep::new("POST", "/pet", json!({"name": "doggie"})).with_description("Create pet"),
            FlowStep::new("DELETE", "/pet/{petId}", json!({})).with_description("Delete pet"),
        ]);

    let mut engine = engine(&server);
    let results = engine.execute_suite(&[order, flow]);

    let urls: Vec<String> = server.seen().into_iter().map(|s| s.url).collect();
    assert_eq!(urls, ["/store/order", "/pet", "/pet/77"]);
    assert_eq!(results[1].verdict, Verdict::Passed, "{:?}", results[1].error);
    assert_eq!(engine.context().get("petId"), Some("999"));
}

// ── Auth ──

fn oauth_server(expires_in: u64) -> MockServer {
    serve(move |seen| {
        if seen.url == "/oauth/token" {
            (200, json!({"access_token": "tok-1", "expires_in": expires_in}))
        } else {
            (200, json!({"ok": true}))
        }
    })
}

fn oauth_engine(server: &MockServer) -> ExecutionEngine {
    engine(server).with_auth(AuthProfile::OAuth2(OAuth2Credentials {
        token_url: format!("{}/oauth/token", server.base_url),
        client_id: "client".into(),
        client_secret: "secret".into(),
        grant_type: "client_credentials".into(),
        scope: None,
    }))
}

#[test]
fn oauth2_token_is_reused_within_its_lifetime() {
    let server = oauth_server(3600);
    let mut engine = oauth_engine(&server);
    let case = TestCase::new(TestCategory::HappyPath, "GET", "/me", "me");

    engine.execute(&case);
    engine.execute(&case);

    assert_eq!(engine.authenticator().unwrap().token_fetches(), 1);
    let seen = server.seen();
    let token_requests: Vec<&Seen> = seen.iter().filter(|s| s.url == "/oauth/token").collect();
    assert_eq!(token_requests.len(), 1);
    assert!(token_requests[0].body.contains("grant_type=client_credentials"));
    for api in seen.iter().filter(|s| s.url == "/me") {
        assert_eq!(api.header("authorization"), Some("Bearer tok-1"));
    }
}

#[test]
fn oauth2_token_near_expiry_is_refetched() {
    let server = oauth_server(60);
    let mut engine = oauth_engine(&server);
    let case = TestCase::new(TestCategory::HappyPath, "GET", "/me", "me");

    engine.execute(&case);
    engine.execute(&case);

    assert_eq!(engine.authenticator().unwrap().token_fetches(), 2);
}

#[test]
fn api_key_header_is_attached() {
    let server = serve(|_| (200, json!({})));
    let mut engine = engine(&server).with_auth(AuthProfile::ApiKey {
        key_name: "X-API-Key".into(),
        key_value: "k-123".into(),
    });
    engine.execute(&TestCase::new(TestCategory::HappyPath, "GET", "/pets", "list"));
    assert_eq!(server.seen()[0].header("x-api-key"), Some("k-123"));
}

// ── Suite and replay ──

#[derive(Default)]
struct Collect {
    indices: Vec<usize>,
    statuses: Vec<SuiteStatus>,
}

impl ProgressSink for Collect {
    fn on_result(&mut self, index: usize, _: &apiforge_core::ExecutionResult, _: &apiforge_core::SuiteSummary) {
        self.indices.push(index);
    }
    fn on_status(&mut self, status: SuiteStatus) {
        self.statuses.push(status);
    }
}

#[test]
fn suite_runs_in_order_and_reports_progress() {
    let server = serve(|seen| if seen.url == "/ok" { (200, json!({})) } else { (500, json!({})) });
    let cases = vec![
        TestCase::new(TestCategory::HappyPath, "GET", "/ok", "first"),
        TestCase::new(TestCategory::HappyPath, "GET", "/broken", "second"),
        TestCase::new(TestCategory::Negative, "GET", "/broken", "third")
            .with_expected_status(vec![400, 422]),
    ];
    let mut sink = Collect::default();

    let report = engine(&server).run_suite(&cases, &mut sink);

    assert_eq!(sink.indices, [0, 1, 2]);
    assert_eq!(sink.statuses, [SuiteStatus::Running, SuiteStatus::Completed]);
    assert_eq!(report.summary.passed, 2);
    assert_eq!(report.summary.passed_with_caveat, 1);
    assert_eq!(report.summary.failed, 1);
    let urls: Vec<String> = server.seen().into_iter().map(|s| s.url).collect();
    assert_eq!(urls, ["/ok", "/broken", "/broken"]);
}

#[test]
fn replay_applies_overrides() {
    let server = serve(|_| (201, json!({"id": 9})));
    let case = TestCase::new(TestCategory::HappyPath, "POST", "/pets", "create")
        .with_payload(json!({"name": "a"}))
        .with_expected_status(vec![200]);
    let overrides = ReplayOverrides {
        payload: Some(json!({"name": "b"})),
        headers: [("X-Trace".to_string(), "replay".to_string())].into(),
        assertions: Some(vec![Assertion::status_equals(201, "")]),
    };

    let result = engine(&server).replay(&case, &overrides);

    assert_eq!(result.actual_status, Some(201));
    assert_eq!(result.verdict, Verdict::Failed);
    let seen = &server.seen()[0];
    assert!(seen.body.contains("\"b\""));
    assert_eq!(seen.header("x-trace"), Some("replay"));
}
