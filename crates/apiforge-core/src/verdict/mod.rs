//! Verdict module - result records, classification, and severity

mod policy;
mod result;
mod severity;

pub use policy::{classify, classify_flow, Classification, Observation, VerdictPolicy};
pub use result::{
    AssertionOutcome, ExecutionResult, RequestSnapshot, ResponseSnapshot, SuiteReport,
    SuiteSummary, TraceStep, Verdict,
};
pub use severity::Severity;
