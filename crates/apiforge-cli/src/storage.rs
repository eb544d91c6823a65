//! Persistent run reports under `.apiforge/reports/`
//!
//! Every `apiforge run` is saved regardless of `--output` mode.
//! Directory layout: `{host_port}_{timestamp}/`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use apiforge_core::{Config, SuiteReport};

/// Stored in place of credential blobs in the config snapshot.
const REDACTED: &str = "***";

/// Everything needed to persist a run.
pub struct ReportData<'a> {
    pub config: &'a Config,
    pub report: &'a SuiteReport,
    pub exit_code: i32,
    pub duration_secs: f64,
}

/// Save a run report to `{base}/{host_port}_{timestamp}/`.
///
/// Returns the report directory path on success.
pub fn save_report(
    base: &Path,
    data: &ReportData,
    now: DateTime<Utc>,
) -> Result<PathBuf, std::io::Error> {
    let report_dir = base.join(build_dir_name(&data.config.base_url, now));
    std::fs::create_dir_all(&report_dir)?;

    // config.toml: snapshot of the config used, credentials masked
    let config_toml = toml::to_string_pretty(&redacted(data.config))
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(report_dir.join("config.toml"), config_toml)?;

    let summary = &data.report.summary;
    let summary_json = serde_json::json!({
        "summary": summary,
        "exit_code": data.exit_code,
        "meta": {
            "timestamp": now.to_rfc3339(),
            "duration_secs": data.duration_secs,
            "base_url": data.config.base_url,
            "spec": data.config.spec.display().to_string(),
        },
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary_json).map_err(std::io::Error::other)?,
    )?;

    std::fs::write(
        report_dir.join("results.json"),
        serde_json::to_string_pretty(data.report).map_err(std::io::Error::other)?,
    )?;

    if data.report.failures().next().is_some() {
        let http_content = apiforge_core::to_http_file(&data.report.results, "base_url");
        std::fs::write(report_dir.join("reproductions.http"), http_content)?;
    }

    Ok(report_dir)
}

fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(auth) = config.auth.as_mut() {
        if auth.credentials.is_some() {
            auth.credentials = Some(REDACTED.to_string());
        }
    }
    if let Some(llm) = config.llm.as_mut() {
        if llm.api_key.is_some() {
            llm.api_key = Some(REDACTED.to_string());
        }
    }
    config
}

/// `{host_port}_{timestamp}` e.g. `localhost_8080_20260205T193000`
fn build_dir_name(base_url: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        extract_host_port(base_url),
        now.format("%Y%m%dT%H%M%S")
    )
}

/// `"http://localhost:8080/path"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .replace(':', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_core::{AuthConfig, AuthType};
    use chrono::TimeZone;

    #[test]
    fn extract_host_port_standard() {
        assert_eq!(extract_host_port("http://localhost:8080"), "localhost_8080");
        assert_eq!(
            extract_host_port("https://api.example.com"),
            "api.example.com"
        );
        assert_eq!(
            extract_host_port("http://10.0.0.1:3000/v1"),
            "10.0.0.1_3000"
        );
    }

    #[test]
    fn dir_name_format() {
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 19, 30, 0).unwrap();
        assert_eq!(
            build_dir_name("http://localhost:8080", now),
            "localhost_8080_20260205T193000"
        );
    }

    #[test]
    fn saved_report_masks_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            auth: Some(AuthConfig {
                auth_type: AuthType::Bearer,
                credentials: Some(r#"{"token": "s3cret"}"#.into()),
                credentials_file: None,
            }),
            ..Config::default()
        };
        let now = Utc::now();
        let report = SuiteReport::from_results(Vec::new(), now, now);
        let data = ReportData {
            config: &config,
            report: &report,
            exit_code: 0,
            duration_secs: 0.1,
        };

        let path = save_report(dir.path(), &data, now).unwrap();

        let snapshot = std::fs::read_to_string(path.join("config.toml")).unwrap();
        assert!(!snapshot.contains("s3cret"));
        assert!(snapshot.contains(REDACTED));
        assert!(path.join("summary.json").exists());
        assert!(path.join("results.json").exists());
        assert!(!path.join("reproductions.http").exists());
    }
}
