//! JSON Schemas for the documents apiforge reads and writes
//!
//! `execution-results.schema.json` describes `run --output json`;
//! `test-cases.schema.json` describes the descriptor file produced by
//! `generate` and consumed by `run --cases` and `replay`.

use crate::case::TestCase;
use crate::verdict::SuiteReport;

/// Schema of [`SuiteReport`].
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(SuiteReport);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}

/// Schema of a descriptor file (`Vec<TestCase>`).
pub fn generate_case_schema() -> String {
    let schema = schemars::schema_for!(Vec<TestCase>);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_generation_produces_valid_json() {
        let schema = generate_schema();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert!(parsed.get("$schema").is_some() || parsed.get("type").is_some());
        assert_eq!(
            parsed.get("title").and_then(|v| v.as_str()),
            Some("SuiteReport")
        );
    }

    #[test]
    fn report_schema_names_verdict_values() {
        let schema = generate_schema();
        assert!(schema.contains("passed_with_caveat"));
        assert!(schema.contains("security_finding"));
    }

    #[test]
    fn case_schema_is_an_array() {
        let parsed: serde_json::Value = serde_json::from_str(&generate_case_schema()).unwrap();
        assert_eq!(parsed["type"], "array");
    }
}
