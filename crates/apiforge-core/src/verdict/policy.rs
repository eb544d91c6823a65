//! Verdict policy - per-category classification and suite exit codes
//!
//! Each [`TestCategory`] owns an ordered list of rules. The first rule that
//! returns a [`Classification`] wins; if none match, the standard
//! expected-status check applies.

use super::{Severity, SuiteSummary, Verdict};
use crate::case::TestCategory;

/// Facts about one response that the rules judge.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub actual_status: u16,
    pub expected_status: &'a [u16],
    /// Messages of assertions that did not hold.
    pub failed_assertions: &'a [String],
    /// Endpoint accepts file uploads.
    pub upload_endpoint: bool,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    pub note: Option<String>,
    pub error: Option<String>,
    pub finding: Option<Severity>,
}

impl Classification {
    fn passed() -> Self {
        Self {
            verdict: Verdict::Passed,
            note: None,
            error: None,
            finding: None,
        }
    }

    fn caveat(note: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::PassedWithCaveat,
            note: Some(note.into()),
            error: None,
            finding: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Failed,
            note: None,
            error: Some(error.into()),
            finding: None,
        }
    }
}

type Rule = fn(&Observation<'_>) -> Option<Classification>;

const REJECTION_STATUSES: [u16; 5] = [400, 403, 404, 415, 422];
const TOLERATED_STATUSES: [u16; 4] = [200, 201, 400, 422];

const HAPPY_RULES: &[Rule] = &[];
const MALICIOUS_RULES: &[Rule] = &[unsupported_upload_media, rejected, accepted_malicious];
const VALIDATION_RULES: &[Rule] = &[unsupported_upload_media, rejected];
const BOUNDARY_RULES: &[Rule] = &[unsupported_upload_media, tolerated];
const PERFORMANCE_RULES: &[Rule] = &[tolerated];

/// Indexed by [`TestCategory::index`].
const CATEGORY_RULES: [&[Rule]; 9] = [
    HAPPY_RULES,       // happy_path
    MALICIOUS_RULES,   // negative
    BOUNDARY_RULES,    // boundary
    VALIDATION_RULES,  // validation
    MALICIOUS_RULES,   // security
    PERFORMANCE_RULES, // performance
    HAPPY_RULES,       // crud
    HAPPY_RULES,       // integration
    HAPPY_RULES,       // e2e
];

/// Classify a single-request case.
#[must_use]
pub fn classify(category: TestCategory, obs: &Observation<'_>) -> Classification {
    CATEGORY_RULES[category.index()]
        .iter()
        .find_map(|rule| rule(obs))
        .unwrap_or_else(|| expected_status_check(obs))
}

/// Classify a flow from its per-step status codes: every step must be 2xx.
#[must_use]
pub fn classify_flow(step_statuses: &[(String, u16)]) -> Classification {
    let failing: Vec<String> = step_statuses
        .iter()
        .filter(|(_, status)| !(200..300).contains(status))
        .map(|(label, status)| format!("{label} returned {status}"))
        .collect();
    if failing.is_empty() {
        Classification::passed()
    } else {
        Classification::failed(format!("Flow step failed: {}", failing.join("; ")))
    }
}

/// Upload endpoints may refuse the placeholder media type.
fn unsupported_upload_media(obs: &Observation<'_>) -> Option<Classification> {
    (obs.upload_endpoint && obs.actual_status == 415).then(|| Classification {
        note: Some("Upload endpoint rejected placeholder media type (415)".to_string()),
        ..Classification::passed()
    })
}

fn rejected(obs: &Observation<'_>) -> Option<Classification> {
    if REJECTION_STATUSES.contains(&obs.actual_status) {
        return Some(Classification::passed());
    }
    (obs.actual_status == 500).then(|| {
        Classification::caveat("Input rejected with a server error instead of a 4xx response")
    })
}

fn accepted_malicious(obs: &Observation<'_>) -> Option<Classification> {
    (200..300).contains(&obs.actual_status).then(|| Classification {
        verdict: Verdict::Failed,
        note: None,
        error: Some(format!(
            "Security issue: invalid input accepted with status {}",
            obs.actual_status
        )),
        finding: Some(Severity::High),
    })
}

fn tolerated(obs: &Observation<'_>) -> Option<Classification> {
    if TOLERATED_STATUSES.contains(&obs.actual_status) {
        return Some(Classification::passed());
    }
    (obs.actual_status == 500)
        .then(|| Classification::caveat("Server error on extreme input; API may lack validation"))
}

fn expected_status_check(obs: &Observation<'_>) -> Classification {
    let actual = obs.actual_status;
    if obs.expected_status.contains(&actual) {
        if obs.failed_assertions.is_empty() {
            return Classification::passed();
        }
        return Classification::failed(obs.failed_assertions.join("; "));
    }
    if actual == 500 {
        Classification::failed(format!(
            "Server error: Expected {:?}, got 500 - API may have validation issues",
            obs.expected_status
        ))
    } else {
        Classification::failed(format!(
            "Expected status {:?}, got {actual}",
            obs.expected_status
        ))
    }
}

/// Policy for turning a suite summary into an exit code
#[derive(Debug, Clone, Default)]
pub struct VerdictPolicy {
    /// Strict mode: caveats fail the run
    pub strict: bool,
}

impl VerdictPolicy {
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Determine final exit code.
    ///
    /// Security findings dominate (2), then failures (1), then errors (3).
    #[must_use]
    pub fn exit_code(&self, summary: &SuiteSummary) -> i32 {
        if summary.security_findings > 0 {
            return Severity::High.exit_code(self.strict);
        }
        if summary.failed > 0 {
            return 1;
        }
        if summary.errors > 0 {
            return 3;
        }
        if summary.passed_with_caveat > 0 {
            return Severity::Medium.exit_code(self.strict);
        }
        0
    }
}
