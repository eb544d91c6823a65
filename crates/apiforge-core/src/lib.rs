//! apiforge-core: Core types and verdict logic for API test generation
//!
//! This crate provides the test-case descriptors shared by generators and the
//! execution engine, the per-category verdict rules, execution records, and
//! the project configuration.

pub mod case;
pub mod config;
pub mod dump;
pub mod http_file;
pub mod schema;
pub mod verdict;

pub use case::{
    Assertion, AssertionKind, BodyEncoding, FlowStep, Operator, TestCase, TestCategory,
};
pub use config::{AuthConfig, AuthType, Config, ConfigError, EndpointFilter, Fixtures, LlmConfig};
pub use dump::{DumpError, DumpIndex};
pub use http_file::to_http_file;
pub use verdict::{
    AssertionOutcome, ExecutionResult, RequestSnapshot, ResponseSnapshot, Severity, SuiteReport,
    SuiteSummary, TraceStep, Verdict, VerdictPolicy,
};
