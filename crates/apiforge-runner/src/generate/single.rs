//! Single-endpoint categories: happy path, negative, boundary, validation,
//! security, performance

use serde_json::{Value, json};

use apiforge_core::{Assertion, TestCase, TestCategory};

use super::HeuristicGenerator;
use super::assertions::{assertions_for, expected_status};
use super::flows;
use super::mutate::{self, BoundaryProbe};
use crate::spec::{EndpointDescriptor, ParamLocation};

/// Large-payload latency ceiling, seconds.
const LARGE_PAYLOAD_MAX_SECS: f64 = 5.0;
/// Steady-state latency ceiling, seconds.
const STEADY_MAX_SECS: f64 = 2.0;

const MALFORMED: [u16; 2] = [400, 422];
const REJECTED: [u16; 3] = [400, 403, 422];
const BAD_PATH: [u16; 3] = [400, 404, 422];
const TRAVERSAL_REJECTED: [u16; 3] = [400, 403, 404];
const WRONG_METHOD: [u16; 2] = [405, 404];

fn has_body(endpoint: &EndpointDescriptor) -> bool {
    matches!(endpoint.method.as_str(), "POST" | "PUT" | "PATCH")
}

fn with_expectation(
    case: TestCase,
    endpoint: &EndpointDescriptor,
    expected: &[u16],
) -> TestCase {
    case.with_expected_status(expected.to_vec())
        .with_assertions(assertions_for(endpoint, expected))
}

pub(super) fn happy_path(g: &HeuristicGenerator<'_>, endpoint: &EndpointDescriptor) -> Vec<TestCase> {
    if matches!(endpoint.method.as_str(), "DELETE" | "PUT" | "PATCH") && endpoint.has_path_params() {
        if let Some(create) = g.create_endpoint(endpoint.resource()) {
            return vec![flows::create_then_act(g, create, endpoint)];
        }
    }

    let op = &endpoint.operation_id;
    let expected = expected_status(endpoint);
    let case = g
        .base_case(endpoint, TestCategory::HappyPath, format!("Happy path: {op}"))
        .with_description(format!("Test successful execution of {op}"));
    vec![with_expectation(case, endpoint, &expected)]
}

pub(super) fn negative(g: &HeuristicGenerator<'_>, endpoint: &EndpointDescriptor) -> Vec<TestCase> {
    let op = &endpoint.operation_id;
    let mut cases = Vec::new();

    let path_serves_get = g
        .spec
        .find_endpoint("GET", &endpoint.path)
        .is_some();
    if endpoint.method != "GET" && !path_serves_get {
        let mut case = TestCase::new(
            TestCategory::Negative,
            "GET",
            &endpoint.path,
            format!("Negative: Invalid method for {op}"),
        )
        .with_operation_id(op)
        .with_description(format!("Test invalid HTTP method for {op}"));
        case = with_expectation(case, endpoint, &WRONG_METHOD);
        cases.push(case);
    }

    for param in endpoint.params_in(ParamLocation::Path) {
        let numeric = matches!(param.schema_type(), "integer" | "number")
            || param.name.to_ascii_lowercase().contains("id");
        let invalid = if numeric { "invalid_value" } else { "" };
        let case = g
            .base_case(
                endpoint,
                TestCategory::Negative,
                format!("Negative: Invalid {} for {op}", param.name),
            )
            .with_path_override(&param.name, invalid)
            .with_description(format!(
                "Test invalid {} value (type: {})",
                param.name,
                param.schema_type()
            ));
        cases.push(with_expectation(case, endpoint, &BAD_PATH));
    }

    if endpoint.is_upload() {
        return cases;
    }

    if has_body(endpoint) {
        let base = g.sample(endpoint).payload;
        let required = endpoint.required_body_fields();
        for field in &required {
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Negative,
                    format!("Negative: Missing required field '{field}' for {op}"),
                )
                .with_payload(mutate::without_field(&base, field))
                .with_description(format!("Test missing required field '{field}'"));
            cases.push(with_expectation(case, endpoint, &MALFORMED));
        }
        if !required.is_empty() {
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Negative,
                    format!("Negative: Empty payload for {op}"),
                )
                .with_payload(json!({}))
                .with_description("Test completely empty payload (missing all required fields)");
            cases.push(with_expectation(case, endpoint, &MALFORMED));
        }
    }

    let sample = g.sample(endpoint).payload;
    let case = g
        .base_case(
            endpoint,
            TestCategory::Negative,
            format!("Negative: Invalid data types for {op}"),
        )
        .with_payload(mutate::flip_types(&sample))
        .with_description("Test invalid data types");
    cases.push(with_expectation(case, endpoint, &MALFORMED));

    cases
}

pub(super) fn boundary(g: &HeuristicGenerator<'_>, endpoint: &EndpointDescriptor) -> Vec<TestCase> {
    let op = &endpoint.operation_id;
    let expected = expected_status(endpoint);
    let sample = g.sample(endpoint).payload;

    let mut probes: Vec<(&str, BoundaryProbe)> = Vec::new();
    if !endpoint.is_upload() {
        probes.extend(BoundaryProbe::STRINGS);
    }
    probes.extend(
        mutate::NUMERIC_BOUNDARIES
            .iter()
            .map(|&(label, n)| (label, BoundaryProbe::Numeric(n))),
    );

    probes
        .into_iter()
        .map(|(label, probe)| {
            let kind = if matches!(probe, BoundaryProbe::Numeric(_)) {
                "numeric boundary"
            } else {
                "boundary value"
            };
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Boundary,
                    format!("Boundary: {label} for {op}"),
                )
                .with_payload(mutate::apply_boundary(&sample, probe))
                .with_description(format!("Test {kind}: {label}"));
            with_expectation(case, endpoint, &expected)
        })
        .collect()
}

pub(super) fn validation(
    g: &HeuristicGenerator<'_>,
    endpoint: &EndpointDescriptor,
) -> Vec<TestCase> {
    endpoint
        .required_body_fields()
        .into_iter()
        .map(|field| {
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Validation,
                    format!("Validation: Missing required field {field}"),
                )
                .with_description(format!(
                    "Test validation when required field {field} is missing"
                ))
                .with_remove_field(field);
            with_expectation(case, endpoint, &MALFORMED)
        })
        .collect()
}

pub(super) fn security(g: &HeuristicGenerator<'_>, endpoint: &EndpointDescriptor) -> Vec<TestCase> {
    let op = &endpoint.operation_id;
    let mut cases = Vec::new();

    if !endpoint.is_upload() {
        let sample = g.sample(endpoint).payload;
        let schema = endpoint.body_target().map(|t| t.schema);

        for vector in mutate::SQL_INJECTION {
            let preview: String = vector.chars().take(30).collect();
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Security,
                    format!("Security: SQL Injection test for {op}"),
                )
                .with_payload(mutate::inject_attack(&sample, schema, vector))
                .with_description(format!(
                    "Test SQL injection protection with invalid schema values: {preview}"
                ));
            cases.push(with_expectation(case, endpoint, &REJECTED));
        }

        for vector in mutate::XSS {
            let case = g
                .base_case(
                    endpoint,
                    TestCategory::Security,
                    format!("Security: XSS test for {op}"),
                )
                .with_payload(mutate::inject_attack(&sample, schema, vector))
                .with_description("Test XSS protection with invalid format/enum values");
            cases.push(with_expectation(case, endpoint, &REJECTED));
        }

        if has_body(endpoint) {
            if let Some(first) = endpoint.required_body_fields().first() {
                let case = g
                    .base_case(
                        endpoint,
                        TestCategory::Security,
                        format!("Security: Missing required field + XSS for {op}"),
                    )
                    .with_payload(mutate::missing_field_with_attack(&sample, first))
                    .with_description(format!(
                        "Test security: missing required field '{first}' with XSS payload"
                    ));
                cases.push(with_expectation(case, endpoint, &MALFORMED));
            }
        }
    }

    if endpoint.has_path_params() {
        let mut case = g
            .base_case(
                endpoint,
                TestCategory::Security,
                format!("Security: Path traversal test for {op}"),
            )
            .with_description("Test path traversal protection");
        for param in endpoint.params_in(ParamLocation::Path) {
            case = case.with_path_override(&param.name, mutate::PATH_TRAVERSAL);
        }
        if endpoint.is_upload() {
            case = case.with_payload(Value::Object(serde_json::Map::new()));
        }
        cases.push(with_expectation(case, endpoint, &TRAVERSAL_REJECTED));
    }

    cases
}

pub(super) fn performance(
    g: &HeuristicGenerator<'_>,
    endpoint: &EndpointDescriptor,
) -> Vec<TestCase> {
    let op = &endpoint.operation_id;
    let expected = expected_status(endpoint);
    let mut cases = Vec::new();

    if has_body(endpoint) {
        let sample = g.sample(endpoint).payload;
        let mut case = g
            .base_case(
                endpoint,
                TestCategory::Performance,
                format!("Performance: Large payload for {op}"),
            )
            .with_payload(mutate::enlarge(&sample))
            .with_description("Test performance with large payload");
        case = with_expectation(case, endpoint, &expected);
        case.assertions.push(Assertion::response_time_below(
            LARGE_PAYLOAD_MAX_SECS,
            "Verify response time is less than 5 seconds",
        ));
        cases.push(case);
    }

    let mut case = g
        .base_case(
            endpoint,
            TestCategory::Performance,
            format!("Performance: Response time check for {op}"),
        )
        .with_description("Test response time under normal load");
    case = with_expectation(case, endpoint, &expected);
    case.assertions.push(Assertion::response_time_below(
        STEADY_MAX_SECS,
        "Verify response time is less than 2 seconds under normal load",
    ));
    cases.push(case);

    cases
}
