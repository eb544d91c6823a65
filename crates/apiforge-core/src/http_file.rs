//! HTTP file generator - converts failing results to .http format

use crate::verdict::{ExecutionResult, RequestSnapshot};

/// Generate .http file content from non-passing results.
///
/// Flow cases emit one request block per executed step.
pub fn to_http_file(results: &[ExecutionResult], base_url_var: &str) -> String {
    let failing: Vec<&ExecutionResult> = results.iter().filter(|r| !r.verdict.is_pass()).collect();
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} failures)",
        failing.len()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for (idx, result) in failing.iter().enumerate() {
        let status = result
            .actual_status
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        let finding = if result.security_finding {
            " [security]"
        } else {
            ""
        };
        lines.push(format!(
            "### [{idx}] {} - {} {}{finding}",
            result.verdict, result.name, status
        ));
        lines.push(format!("# Category: {}", result.category));
        if let Some(error) = &result.error {
            lines.push(format!("# Error: {}", error.replace('\n', " ")));
        }

        for step in &result.trace {
            if result.trace.len() > 1 {
                lines.push(format!("# Step {}: {}", step.step, step.description));
            }
            push_request(&mut lines, &step.request, base_url_var);
            lines.push(String::new());
        }

        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

fn push_request(lines: &mut Vec<String>, request: &RequestSnapshot, base_url_var: &str) {
    let url = if request.url.starts_with("http") {
        request.url.clone()
    } else {
        format!("{{{{{base_url_var}}}}}{}", request.url)
    };
    lines.push(format!("{} {}", request.method, url));

    for (key, value) in &request.headers {
        if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
            lines.push(format!("{key}: {value}"));
        }
    }

    if let Some(body) = &request.body {
        if !request
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            lines.push("Content-Type: application/json".to_string());
        }
        lines.push(String::new());
        lines.push(body.clone());
    }
}

/// Generate a single request as .http format
pub fn request_to_http(request: &RequestSnapshot, comment: Option<&str>) -> String {
    let mut lines = Vec::new();

    if let Some(c) = comment {
        lines.push(format!("### {c}"));
    }

    lines.push(format!("{} {}", request.method, request.url));

    for (key, value) in &request.headers {
        lines.push(format!("{key}: {value}"));
    }

    if let Some(body) = &request.body {
        lines.push(String::new());
        lines.push(body.clone());
    }

    lines.join("\n")
}
