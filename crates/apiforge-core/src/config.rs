//! Project configuration for test generation and execution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::case::TestCategory;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI / Swagger document path (local file)
    pub spec: PathBuf,

    /// Base URL of the server under test
    pub base_url: String,

    /// Static HTTP headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Categories to generate (empty = all)
    #[serde(default)]
    pub categories: Vec<TestCategory>,

    /// Endpoints to generate for (empty = all)
    #[serde(default)]
    pub endpoints: Vec<EndpointFilter>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Known-good payloads per resource name, e.g. `[fixtures.pet]`
    #[serde(default)]
    pub fixtures: Fixtures,

    /// Dump all results to JSONL files
    #[serde(default)]
    pub dump: bool,

    /// Directory for dump files (default: ".apiforge/dumps")
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Restrict generation to one operation.
///
/// ```toml
/// [[endpoints]]
/// path = "/pets"
/// method = "POST"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFilter {
    pub path: String,
    /// Any method when absent
    #[serde(default)]
    pub method: Option<String>,
}

impl EndpointFilter {
    /// Parse `"POST /pets"` or `"/pets"`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().split_once(' ') {
            Some((method, path)) => Self {
                path: path.trim().to_string(),
                method: Some(method.to_uppercase()),
            },
            None => Self {
                path: label.trim().to_string(),
                method: None,
            },
        }
    }

    #[must_use]
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.path == path
            && self
                .method
                .as_deref()
                .is_none_or(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Authentication scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Basic,
    Bearer,
    ApiKey,
    Oauth2,
}

impl AuthType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Bearer => "bearer",
            Self::ApiKey => "api_key",
            Self::Oauth2 => "oauth2",
        }
    }
}

/// `[auth]` table.
///
/// `credentials` is a JSON object whose shape depends on `auth_type`; it may
/// instead be read from `credentials_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub auth_type: AuthType,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

impl AuthConfig {
    /// Raw credential blob, from the inline value or the referenced file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or neither source is set.
    pub fn credential_blob(&self) -> Result<String, ConfigError> {
        if let Some(inline) = &self.credentials {
            return Ok(inline.clone());
        }
        match &self.credentials_file {
            Some(path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| ConfigError::Io(path.clone(), e.to_string())),
            None => Err(ConfigError::Parse(
                "[auth] needs `credentials` or `credentials_file`".to_string(),
            )),
        }
    }
}

/// `[llm]` table. Presence switches generation to the LLM synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `local`, `openai`, `openrouter`, `anthropic`, `xai`, ...
    pub provider: String,
    pub model: String,
    /// Overrides the provider's default chat-completions base URL
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Falls back to `APIFORGE_LLM_API_KEY` when unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Environment variable consulted when `llm.api_key` is unset.
pub const LLM_API_KEY_ENV: &str = "APIFORGE_LLM_API_KEY";

impl LlmConfig {
    /// Configured key, else the environment, ignoring blanks.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(LLM_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

const fn default_max_tokens() -> u32 {
    4096
}

/// Resource name → known-good payload.
///
/// Consulted when an endpoint has no usable body schema, and merged over the
/// synthesized body when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixtures(BTreeMap<String, Value>);

impl Fixtures {
    #[must_use]
    pub fn get(&self, resource: &str) -> Option<&Value> {
        self.0
            .get(resource)
            .or_else(|| self.0.get(&resource.to_ascii_lowercase()))
    }

    pub fn insert(&mut self, resource: impl Into<String>, payload: Value) {
        self.0.insert(resource.into(), payload);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Fixtures {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: "http://localhost:8080".to_string(),
            headers: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            categories: Vec::new(),
            endpoints: Vec::new(),
            auth: None,
            llm: None,
            fixtures: Fixtures::default(),
            dump: false,
            dump_dir: None,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.apiforge.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apiforge.toml", ".apiforge.json", "apiforge.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Categories to generate, defaulting to all.
    #[must_use]
    pub fn enabled_categories(&self) -> Vec<TestCategory> {
        if self.categories.is_empty() {
            TestCategory::ALL.to_vec()
        } else {
            self.categories.clone()
        }
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# apiforge configuration

# OpenAPI 3.x or Swagger 2.0 document (JSON or YAML)
spec = "openapi.yaml"

# Server to test
base_url = "http://localhost:8080"

# Per-request timeout in seconds
# timeout_secs = 30

# Restrict generation (default: everything)
# categories = ["happy_path", "negative", "security"]
# [[endpoints]]
# path = "/pets"
# method = "POST"

# Static headers
[headers]
# X-Request-Source = "apiforge"

# Authentication: basic | bearer | api_key | oauth2
# [auth]
# auth_type = "bearer"
# credentials = '{"token": "your-token-here"}'
# credentials_file = "secrets/auth.json"

# LLM-backed generation (omit for heuristic generation)
# [llm]
# provider = "openai"      # local | openai | openrouter | anthropic | xai
# model = "gpt-4o-mini"
# api_key = "sk-..."       # or APIFORGE_LLM_API_KEY
# max_tokens = 4096

# Known-good payloads per resource
# [fixtures.pet]
# name = "doggie"
# photoUrls = ["https://example.com/dog.jpg"]
# status = "available"

# Dump all results to JSONL files (default: false)
# dump = true
# dump_dir = ".apiforge/dumps"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.spec, PathBuf::from("openapi.yaml"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.enabled_categories().len(), 9);
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(Config::example()).unwrap();
        assert_eq!(config.spec, PathBuf::from("openapi.yaml"));
        assert!(config.auth.is_none());
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
spec = "api.yaml"
base_url = "http://localhost:3000"
timeout_secs = 5
categories = ["happy_path", "security"]

[headers]
X-Trace = "1"

[[endpoints]]
path = "/pets"
method = "POST"

[auth]
auth_type = "oauth2"
credentials = '{"token_url": "http://idp/token", "client_id": "a", "client_secret": "b"}'

[llm]
provider = "local"
model = "llama3"

[fixtures.pet]
name = "doggie"
photoUrls = ["x"]
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.spec, PathBuf::from("api.yaml"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(
            config.enabled_categories(),
            vec![TestCategory::HappyPath, TestCategory::Security]
        );
        assert_eq!(config.headers.get("X-Trace"), Some(&"1".to_string()));
        assert!(config.endpoints[0].matches("post", "/pets"));

        let auth = config.auth.unwrap();
        assert_eq!(auth.auth_type, AuthType::Oauth2);
        assert!(auth.credential_blob().unwrap().contains("token_url"));

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, "local");
        assert_eq!(llm.max_tokens, 4096);

        assert_eq!(
            config.fixtures.get("pet"),
            Some(&json!({"name": "doggie", "photoUrls": ["x"]}))
        );
    }

    #[test]
    fn credentials_file_is_read_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{\"token\": \"t\"}\n").unwrap();
        let auth = AuthConfig {
            auth_type: AuthType::Bearer,
            credentials: None,
            credentials_file: Some(path),
        };
        assert_eq!(auth.credential_blob().unwrap(), "{\"token\": \"t\"}");
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let auth = AuthConfig {
            auth_type: AuthType::Basic,
            credentials: None,
            credentials_file: None,
        };
        assert!(matches!(auth.credential_blob(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn endpoint_filter_parse() {
        let f = EndpointFilter::parse("delete /pets/{petId}");
        assert_eq!(f.method.as_deref(), Some("DELETE"));
        assert_eq!(f.path, "/pets/{petId}");
        assert!(f.matches("DELETE", "/pets/{petId}"));
        assert!(!f.matches("GET", "/pets/{petId}"));

        let any = EndpointFilter::parse("/pets");
        assert!(any.matches("GET", "/pets"));
        assert!(any.matches("POST", "/pets"));
    }

    #[test]
    fn load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"spec": "s.json", "base_url": "http://x"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, "http://x");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/apiforge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
