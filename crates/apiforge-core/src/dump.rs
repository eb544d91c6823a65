//! Full result dump to JSONL files
//!
//! Writes every execution result (not just failures) to per-operation JSONL
//! files for post-hoc analysis and audit trails.
//!
//! ```text
//! .apiforge/dumps/
//! ├── GET__pets.jsonl
//! ├── POST__pets.jsonl
//! └── index.json
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::verdict::{ExecutionResult, Verdict};

/// Headers that should be masked in dumps for security.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Mask value for redacted headers.
const MASK: &str = "***";

/// Summary of a dump operation, written as `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpIndex {
    /// Total results dumped
    pub total: u64,
    pub operations: Vec<DumpOperationEntry>,
    pub dump_dir: PathBuf,
}

/// An entry in the dump index for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpOperationEntry {
    /// Operation label, e.g. "POST /pets"
    pub operation: String,
    pub file: String,
    pub count: u64,
    /// Results per verdict, e.g. {"passed": 3, "failed": 1}
    pub verdicts: BTreeMap<Verdict, u64>,
}

/// Write all results to per-operation JSONL files.
///
/// # Errors
///
/// Returns error if dump directory cannot be created or files cannot be written.
pub fn write_dump(
    results: &[ExecutionResult],
    dump_dir: &Path,
    mask_headers: bool,
) -> Result<DumpIndex, DumpError> {
    std::fs::create_dir_all(dump_dir)
        .map_err(|e| DumpError::Io(format!("create {}: {e}", dump_dir.display())))?;

    // BTreeMap keeps file order deterministic
    let mut groups: BTreeMap<String, Vec<&ExecutionResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(format!("{} {}", result.method, result.endpoint))
            .or_default()
            .push(result);
    }

    let mut entries = Vec::new();
    let mut total: u64 = 0;

    for (operation, results) in groups {
        let filename = sanitize_filename(&operation);
        let filepath = dump_dir.join(&filename);

        let file = std::fs::File::create(&filepath)
            .map_err(|e| DumpError::Io(format!("create {}: {e}", filepath.display())))?;
        let mut writer = std::io::BufWriter::new(file);

        let count = results.len() as u64;
        total += count;
        let mut verdicts = BTreeMap::new();

        for result in results {
            *verdicts.entry(result.verdict).or_insert(0) += 1;
            let line = if mask_headers {
                serde_json::to_string(&mask_result(result))
            } else {
                serde_json::to_string(result)
            }
            .map_err(|e| DumpError::Serialize(e.to_string()))?;
            writeln!(writer, "{line}")
                .map_err(|e| DumpError::Io(format!("write {}: {e}", filepath.display())))?;
        }

        writer
            .flush()
            .map_err(|e| DumpError::Io(format!("flush {}: {e}", filepath.display())))?;

        entries.push(DumpOperationEntry {
            operation,
            file: filename,
            count,
            verdicts,
        });
    }

    let index = DumpIndex {
        total,
        operations: entries,
        dump_dir: dump_dir.to_path_buf(),
    };

    let index_path = dump_dir.join("index.json");
    let index_json =
        serde_json::to_string_pretty(&index).map_err(|e| DumpError::Serialize(e.to_string()))?;
    std::fs::write(&index_path, index_json)
        .map_err(|e| DumpError::Io(format!("write {}: {e}", index_path.display())))?;

    Ok(index)
}

/// Maximum characters kept from the operation label in the filename.
/// Prevents PATH_MAX issues on macOS (1024) and Linux (4096).
const MAX_FILENAME_LEN: usize = 200;

/// "POST /pets/{petId}" → "POST__pets__petId_.jsonl"
fn sanitize_filename(operation: &str) -> String {
    let sanitized: String = operation
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' => c,
            _ => '_',
        })
        .collect();
    format!("{sanitized}.jsonl")
}

/// Returns true if the header name matches a known sensitive header (case-insensitive).
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|&h| name.eq_ignore_ascii_case(h))
}

/// Mask sensitive request and response headers in every trace step.
#[must_use]
pub fn mask_result(result: &ExecutionResult) -> ExecutionResult {
    let mut masked = result.clone();
    for step in &mut masked.trace {
        mask_headers(&mut step.request.headers);
        if let Some(response) = step.response.as_mut() {
            mask_headers(&mut response.headers);
        }
    }
    masked
}

fn mask_headers(headers: &mut BTreeMap<String, String>) {
    for (key, value) in headers.iter_mut() {
        if is_sensitive_header(key) {
            *value = MASK.to_string();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::TestCategory;
    use crate::verdict::{RequestSnapshot, ResponseSnapshot, TraceStep};
    use chrono::Utc;

    fn result(method: &str, endpoint: &str, verdict: Verdict) -> ExecutionResult {
        let now = Utc::now();
        ExecutionResult {
            name: format!("{method} {endpoint}"),
            category: TestCategory::HappyPath,
            endpoint: endpoint.into(),
            method: method.into(),
            expected_status: vec![200],
            actual_status: Some(200),
            verdict,
            note: None,
            error: None,
            security_finding: false,
            severity: None,
            assertion_results: vec![],
            trace: vec![TraceStep {
                step: 1,
                description: String::new(),
                request: RequestSnapshot {
                    method: method.into(),
                    url: format!("http://localhost{endpoint}"),
                    headers: BTreeMap::from([
                        ("authorization".into(), "Bearer secret-token".into()),
                        ("content-type".into(), "application/json".into()),
                    ]),
                    body: Some(r#"{"key":"value"}"#.into()),
                },
                response: Some(ResponseSnapshot {
                    status_code: 200,
                    headers: BTreeMap::from([("set-cookie".into(), "sid=1".into())]),
                    body: r#"{"ok":true}"#.into(),
                    latency_ms: 5,
                }),
                error: None,
            }],
            started_at: now,
            completed_at: now,
            duration_ms: 5,
        }
    }

    #[test]
    fn sanitize_simple() {
        assert_eq!(sanitize_filename("GET /health"), "GET__health.jsonl");
    }

    #[test]
    fn sanitize_complex_path() {
        assert_eq!(
            sanitize_filename("POST /api/v2/users/{id}"),
            "POST__api_v2_users__id_.jsonl"
        );
    }

    #[test]
    fn mask_request_and_response_headers() {
        let masked = mask_result(&result("POST", "/test", Verdict::Passed));
        let step = &masked.trace[0];
        assert_eq!(step.request.headers["authorization"], "***");
        assert_eq!(step.request.headers["content-type"], "application/json");
        assert_eq!(step.response.as_ref().unwrap().headers["set-cookie"], "***");
    }

    #[test]
    fn sensitive_header_match_is_case_insensitive() {
        assert!(is_sensitive_header("X-Api-Key"));
        assert!(!is_sensitive_header("Accept"));
    }

    #[test]
    fn no_mask_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let index = write_dump(&[result("POST", "/test", Verdict::Passed)], dir.path(), false)
            .unwrap();
        assert_eq!(index.total, 1);

        let content = std::fs::read_to_string(dir.path().join(&index.operations[0].file)).unwrap();
        let parsed: ExecutionResult = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(
            parsed.trace[0].request.headers["authorization"],
            "Bearer secret-token"
        );
    }

    #[test]
    fn write_dump_groups_by_operation() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            result("POST", "/users", Verdict::Passed),
            result("POST", "/users", Verdict::Failed),
            result("GET", "/health", Verdict::Passed),
        ];

        let index = write_dump(&results, dir.path(), true).unwrap();

        assert_eq!(index.total, 3);
        assert_eq!(index.operations.len(), 2);
        assert_eq!(index.operations[0].operation, "GET /health");
        assert_eq!(index.operations[1].operation, "POST /users");
        assert_eq!(index.operations[1].count, 2);
        assert_eq!(index.operations[1].verdicts[&Verdict::Failed], 1);

        for entry in &index.operations {
            let content = std::fs::read_to_string(dir.path().join(&entry.file)).unwrap();
            let lines: Vec<_> = content.lines().collect();
            assert_eq!(lines.len(), entry.count as usize);
            for line in lines {
                let _: ExecutionResult = serde_json::from_str(line).unwrap();
            }
        }

        let index_content = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        let parsed: DumpIndex = serde_json::from_str(&index_content).unwrap();
        assert_eq!(parsed.total, 3);
    }

    #[test]
    fn write_dump_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = write_dump(&[], dir.path(), true).unwrap();
        assert_eq!(index.total, 0);
        assert!(index.operations.is_empty());
        assert!(dir.path().join("index.json").exists());
    }
}
