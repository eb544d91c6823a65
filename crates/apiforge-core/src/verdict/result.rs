//! Execution records: per-case results, traces, and suite summary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;
use crate::case::{AssertionKind, Operator, TestCategory};

/// Outcome of one test case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    /// Target rejected the input, but with a server error instead of a 4xx.
    PassedWithCaveat,
    Failed,
    /// The case could not be executed (transport, auth, malformed case).
    Error,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::PassedWithCaveat => "passed_with_caveat",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Passed | Self::PassedWithCaveat)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of HTTP request for reproduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Snapshot of HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(default)]
    pub latency_ms: u64,
}

/// One request/response exchange within a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TraceStep {
    /// 1-based position within the case.
    pub step: usize,
    #[serde(default)]
    pub description: String,
    pub request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceStep {
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }
}

/// Evaluated assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssertionOutcome {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    pub condition: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub expected_value: Value,
    pub actual_value: Value,
    pub passed: bool,
    pub message: String,
}

/// Result of executing one [`TestCase`](crate::case::TestCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionResult {
    pub name: String,
    pub category: TestCategory,
    pub endpoint: String,
    pub method: String,
    pub expected_status: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_status: Option<u16>,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub security_finding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_results: Vec<AssertionOutcome>,
    pub trace: Vec<TraceStep>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Last recorded response, if any step got one.
    #[must_use]
    pub fn last_response(&self) -> Option<&ResponseSnapshot> {
        self.trace.iter().rev().find_map(|s| s.response.as_ref())
    }
}

/// Aggregate counts over a suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteSummary {
    pub total: usize,
    /// Includes `passed_with_caveat`.
    pub passed: usize,
    pub passed_with_caveat: usize,
    pub failed: usize,
    pub errors: usize,
    pub security_findings: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SuiteSummary {
    #[must_use]
    pub fn start(total: usize, now: DateTime<Utc>) -> Self {
        Self {
            total,
            passed: 0,
            passed_with_caveat: 0,
            failed: 0,
            errors: 0,
            security_findings: 0,
            started_at: now,
            completed_at: None,
        }
    }

    pub fn record(&mut self, result: &ExecutionResult) {
        match result.verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::PassedWithCaveat => {
                self.passed += 1;
                self.passed_with_caveat += 1;
            }
            Verdict::Failed => self.failed += 1,
            Verdict::Error => self.errors += 1,
        }
        if result.security_finding {
            self.security_findings += 1;
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
    }

    /// Cases counted so far.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.passed + self.failed + self.errors
    }
}

/// Serialized output of a suite run (the `--output json` payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteReport {
    pub summary: SuiteSummary,
    pub results: Vec<ExecutionResult>,
}

impl SuiteReport {
    /// Build a report from finished results.
    #[must_use]
    pub fn from_results(
        results: Vec<ExecutionResult>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut summary = SuiteSummary::start(results.len(), started_at);
        for r in &results {
            summary.record(r);
        }
        summary.finish(completed_at);
        Self { summary, results }
    }

    /// Results that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.verdict.is_pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(verdict: Verdict, security_finding: bool) -> ExecutionResult {
        let now = Utc::now();
        ExecutionResult {
            name: "case".into(),
            category: TestCategory::Security,
            endpoint: "/pets".into(),
            method: "POST".into(),
            expected_status: vec![400, 403, 422],
            actual_status: Some(200),
            verdict,
            note: None,
            error: None,
            security_finding,
            severity: security_finding.then_some(Severity::High),
            assertion_results: vec![],
            trace: vec![],
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn verdict_serializes_snake_case() {
        let json = serde_json::to_string(&Verdict::PassedWithCaveat).unwrap();
        assert_eq!(json, "\"passed_with_caveat\"");
    }

    #[test]
    fn caveat_counts_as_pass() {
        assert!(Verdict::PassedWithCaveat.is_pass());
        assert!(!Verdict::Error.is_pass());
    }

    #[test]
    fn summary_counts_every_verdict() {
        let results = vec![
            sample_result(Verdict::Passed, false),
            sample_result(Verdict::PassedWithCaveat, false),
            sample_result(Verdict::Failed, true),
            sample_result(Verdict::Error, false),
        ];
        let now = Utc::now();
        let report = SuiteReport::from_results(results, now, now);
        let s = &report.summary;
        assert_eq!(s.total, 4);
        assert_eq!(s.passed, 2);
        assert_eq!(s.passed_with_caveat, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.errors, 1);
        assert_eq!(s.security_findings, 1);
        assert_eq!(s.completed(), 4);
        assert!(s.completed_at.is_some());
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn summary_timestamps_are_rfc3339() {
        let now = Utc::now();
        let report = SuiteReport::from_results(vec![], now, now);
        let v = serde_json::to_value(&report.summary).unwrap();
        let started = v["started_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(started).is_ok());
    }
}
