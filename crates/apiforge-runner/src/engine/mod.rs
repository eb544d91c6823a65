//! Execution engine
//!
//! Runs generated cases against a live target, strictly in order on one
//! client. Values captured from successful responses feed path placeholders
//! of later requests through one [`ExecutionContext`] per engine instance.
//! Transport and auth failures become `error` verdicts of the case that hit
//! them; the suite always runs to the end.

pub mod auth;
pub mod checks;
pub mod context;
pub mod params;
pub mod request;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::Value;

use apiforge_core::verdict::{Observation, classify, classify_flow};
use apiforge_core::{
    Assertion, Config, ExecutionResult, Fixtures, SuiteReport, SuiteSummary, TestCase, TraceStep,
    Verdict,
};

pub use auth::{
    AuthAcquisitionError, AuthProfile, Authenticator, CredentialDecryptor, DecryptionError,
    OAuth2Credentials, PlaintextCredentials,
};
pub use checks::{Exchange, evaluate, evaluate_all, lookup_field};
pub use context::ExecutionContext;
pub use request::{StepRequest, is_upload_path};

use request::{Dispatched, dispatch, prepare};

/// Per-request timeout unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Cannot build HTTP client: {0}")]
    Client(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request to {0} timed out")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Auth(#[from] AuthAcquisitionError),
}

/// Suite lifecycle reported to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteStatus {
    Running,
    Completed,
    /// Every case errored: the target was never reached successfully.
    Failed,
}

impl SuiteStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Receives incremental results while a suite runs.
pub trait ProgressSink {
    fn on_result(&mut self, index: usize, result: &ExecutionResult, summary: &SuiteSummary);
    fn on_status(&mut self, status: SuiteStatus);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_result(&mut self, _: usize, _: &ExecutionResult, _: &SuiteSummary) {}
    fn on_status(&mut self, _: SuiteStatus) {}
}

/// Caller-supplied replacements for an ad-hoc replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayOverrides {
    pub payload: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub assertions: Option<Vec<Assertion>>,
}

/// Runs [`TestCase`]s against one target.
#[derive(Debug)]
pub struct ExecutionEngine {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
    headers: BTreeMap<String, String>,
    auth: Option<Authenticator>,
    fixtures: Fixtures,
    context: ExecutionContext,
    rng: SmallRng,
}

impl ExecutionEngine {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ExecutionError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ExecutionError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            headers: BTreeMap::new(),
            auth: None,
            fixtures: Fixtures::default(),
            context: ExecutionContext::new(),
            rng: SmallRng::from_entropy(),
        })
    }

    /// Engine for `config.base_url` with its headers, timeout, fixtures and
    /// auth profile.
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be built, the credential blob is
    /// missing, or it cannot be decrypted into a valid profile.
    pub fn from_config(
        config: &Config,
        decryptor: &dyn CredentialDecryptor,
    ) -> Result<Self, crate::Error> {
        let mut engine = Self::new(config.base_url.clone())?
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_headers(config.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .with_fixtures(config.fixtures.clone());
        if let Some(auth) = &config.auth {
            let blob = auth.credential_blob()?;
            engine = engine.with_auth(AuthProfile::decrypt(auth.auth_type, &blob, decryptor)?);
        }
        Ok(engine)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_auth(mut self, profile: AuthProfile) -> Self {
        tracing::debug!("auth profile configured");
        self.auth = Some(Authenticator::new(profile));
        self
    }

    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// Deterministic synthetic path values.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    #[must_use]
    pub fn authenticator(&self) -> Option<&Authenticator> {
        self.auth.as_ref()
    }

    /// Prepare, send, and on 2xx capture identifiers from one step.
    fn send_step(&mut self, step: &StepRequest<'_>) -> Result<Dispatched, ExecutionError> {
        let prepared = prepare(
            step,
            &self.base_url,
            &self.headers,
            &self.context,
            &self.fixtures,
            &mut self.rng,
        )?;
        let dispatched = dispatch(&self.client, self.auth.as_mut(), prepared, self.timeout)?;
        let status = dispatched.exchange.status;
        if (200..300).contains(&status) {
            if let Some(body) = &dispatched.exchange.body_json {
                self.context
                    .record_response(crate::spec::resource_of(step.endpoint), body);
            }
        }
        Ok(dispatched)
    }

    /// Execute one case. Never fails: problems become an `error` verdict.
    pub fn execute(&mut self, case: &TestCase) -> ExecutionResult {
        let started_at = Utc::now();
        let mut result = ExecutionResult {
            name: case.name.clone(),
            category: case.category,
            endpoint: case.endpoint.clone(),
            method: case.method.clone(),
            expected_status: case.expected_status.clone(),
            actual_status: None,
            verdict: Verdict::Error,
            note: None,
            error: None,
            security_finding: false,
            severity: None,
            assertion_results: Vec::new(),
            trace: Vec::new(),
            started_at,
            completed_at: started_at,
            duration_ms: 0,
        };

        if case.is_flow() {
            self.run_flow(case, &mut result);
        } else {
            self.run_single(case, &mut result);
        }

        let completed_at = Utc::now();
        result.completed_at = completed_at;
        result.duration_ms = u64::try_from((completed_at - started_at).num_milliseconds()).unwrap_or(0);
        tracing::info!(
            case = %case.name,
            category = %case.category,
            verdict = %result.verdict,
            status = ?result.actual_status,
            "case finished"
        );
        result
    }

    fn run_single(&mut self, case: &TestCase, result: &mut ExecutionResult) {
        let step = StepRequest::from_case(case);
        match self.send_step(&step) {
            Ok(dispatched) => {
                let outcomes = evaluate_all(&case.assertions, &dispatched.exchange);
                let failed: Vec<String> = outcomes
                    .iter()
                    .filter(|o| !o.passed)
                    .map(|o| o.message.clone())
                    .collect();
                let status = dispatched.exchange.status;
                let classification = classify(
                    case.category,
                    &Observation {
                        actual_status: status,
                        expected_status: &case.expected_status,
                        failed_assertions: &failed,
                        upload_endpoint: is_upload_path(&case.endpoint),
                    },
                );
                result.actual_status = Some(status);
                result.verdict = classification.verdict;
                result.note = classification.note;
                result.error = classification.error;
                result.security_finding = classification.finding.is_some();
                result.severity = classification.finding;
                result.assertion_results = outcomes;
                result.trace.push(TraceStep {
                    step: 1,
                    description: case.description.clone(),
                    request: dispatched.request,
                    response: Some(dispatched.response),
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(case = %case.name, error = %e, "case errored");
                result.verdict = Verdict::Error;
                result.error = Some(e.to_string());
            }
        }
    }

    fn run_flow(&mut self, case: &TestCase, result: &mut ExecutionResult) {
        self.context.begin_flow();
        self.run_flow_steps(case, result);
        self.context.end_flow();
    }

    fn run_flow_steps(&mut self, case: &TestCase, result: &mut ExecutionResult) {
        let mut statuses: Vec<(String, u16)> = Vec::new();
        for (i, step) in case.flow.iter().enumerate() {
            let label = format!("Step {} ({} {})", i + 1, step.method, step.endpoint);
            match self.send_step(&StepRequest::from_step(case, step)) {
                Ok(dispatched) => {
                    statuses.push((label, dispatched.exchange.status));
                    result.actual_status = Some(dispatched.exchange.status);
                    result.trace.push(TraceStep {
                        step: i + 1,
                        description: step.description.clone(),
                        request: dispatched.request,
                        response: Some(dispatched.response),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(case = %case.name, step = i + 1, error = %e, "flow aborted");
                    result.trace.push(TraceStep {
                        step: i + 1,
                        description: step.description.clone(),
                        request: apiforge_core::RequestSnapshot {
                            method: step.method.clone(),
                            url: format!("{}{}", self.base_url.trim_end_matches('/'), step.endpoint),
                            headers: BTreeMap::new(),
                            body: None,
                        },
                        response: None,
                        error: Some(e.to_string()),
                    });
                    result.verdict = Verdict::Error;
                    result.error = Some(format!("{label} failed: {e}"));
                    return;
                }
            }
        }
        let classification = classify_flow(&statuses);
        result.verdict = classification.verdict;
        result.note = classification.note;
        result.error = classification.error;
    }

    /// Execute cases in order.
    pub fn execute_suite(&mut self, cases: &[TestCase]) -> Vec<ExecutionResult> {
        self.run_suite(cases, &mut NoProgress).results
    }

    /// Execute cases in order, reporting each result to `sink`.
    pub fn run_suite(&mut self, cases: &[TestCase], sink: &mut dyn ProgressSink) -> SuiteReport {
        let started_at = Utc::now();
        let mut summary = SuiteSummary::start(cases.len(), started_at);
        sink.on_status(SuiteStatus::Running);

        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let result = self.execute(case);
            summary.record(&result);
            sink.on_result(index, &result, &summary);
            results.push(result);
        }

        summary.finish(Utc::now());
        let status = if summary.total > 0 && summary.errors == summary.total {
            SuiteStatus::Failed
        } else {
            SuiteStatus::Completed
        };
        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            errors = summary.errors,
            status = status.as_str(),
            "suite finished"
        );
        sink.on_status(status);
        SuiteReport { summary, results }
    }

    /// Re-run one case with caller-supplied payload, headers or assertions.
    pub fn replay(&mut self, case: &TestCase, overrides: &ReplayOverrides) -> ExecutionResult {
        let mut case = case.clone();
        if let Some(payload) = &overrides.payload {
            case.payload = payload.clone();
        }
        case.headers
            .extend(overrides.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(assertions) = &overrides.assertions {
            case.assertions = assertions.clone();
        }
        self.execute(&case)
    }
}
