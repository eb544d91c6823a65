//! Test-case descriptors
//!
//! A [`TestCase`] is produced once per generation run (heuristic or LLM) and
//! handed to the execution engine. It is plain data: everything the engine
//! needs to build the request(s) lives on the descriptor.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Test category. Every descriptor carries exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    HappyPath,
    Negative,
    Boundary,
    Validation,
    Security,
    Performance,
    Crud,
    Integration,
    E2e,
}

impl TestCategory {
    /// All categories in generation order.
    pub const ALL: [Self; 9] = [
        Self::HappyPath,
        Self::Negative,
        Self::Boundary,
        Self::Validation,
        Self::Security,
        Self::Performance,
        Self::Crud,
        Self::Integration,
        Self::E2e,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HappyPath => "happy_path",
            Self::Negative => "negative",
            Self::Boundary => "boundary",
            Self::Validation => "validation",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Crud => "crud",
            Self::Integration => "integration",
            Self::E2e => "e2e",
        }
    }

    /// Stable index into per-category lookup tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Categories whose descriptors are built across endpoints of one resource.
    #[must_use]
    pub const fn is_cross_endpoint(self) -> bool {
        matches!(self, Self::Crud | Self::Integration | Self::E2e)
    }

    /// Categories that expect the target to reject the request.
    #[must_use]
    pub const fn seeks_rejection(self) -> bool {
        matches!(self, Self::Negative | Self::Security | Self::Validation)
    }
}

impl std::fmt::Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown test category: {0}")]
pub struct UnknownCategory(pub String);

/// How the request body is encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
    /// `multipart/form-data`
    Multipart,
    /// `application/octet-stream`
    Binary,
}

impl BodyEncoding {
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::Binary => "application/octet-stream",
        }
    }

    fn is_json(&self) -> bool {
        *self == Self::Json
    }
}

/// One step of a multi-step flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowStep {
    /// Path template, e.g. `/pets/{petId}`. Placeholders are resolved at dispatch time.
    pub endpoint: String,
    pub method: String,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BodyEncoding::is_json")]
    pub encoding: BodyEncoding,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_fields: Vec<String>,
}

impl FlowStep {
    #[must_use]
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into().to_uppercase(),
            payload,
            query: None,
            description: String::new(),
            encoding: BodyEncoding::Json,
            file_fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: Option<Value>) -> Self {
        self.query = query.filter(|q| q.as_object().is_some_and(|o| !o.is_empty()));
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: BodyEncoding, file_fields: Vec<String>) -> Self {
        self.encoding = encoding;
        self.file_fields = file_fields;
        self
    }
}

/// What an assertion inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    StatusCode,
    ResponseBody,
    ResponseHeader,
    ResponseTime,
}

impl AssertionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusCode => "status_code",
            Self::ResponseBody => "response_body",
            Self::ResponseHeader => "response_header",
            Self::ResponseTime => "response_time",
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Matches,
    Exists,
    NotExists,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Matches => "matches",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response check attached to a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    pub condition: Operator,
    #[serde(default)]
    pub expected_value: Value,
    /// Dot/array-index path into the response body, or the header name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Assertion {
    #[must_use]
    pub fn status_equals(status: u16, description: impl Into<String>) -> Self {
        Self {
            kind: AssertionKind::StatusCode,
            condition: Operator::Equals,
            expected_value: Value::from(status),
            field: None,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn status_not_equals(status: u16, description: impl Into<String>) -> Self {
        Self {
            condition: Operator::NotEquals,
            ..Self::status_equals(status, description)
        }
    }

    #[must_use]
    pub fn body_exists(field: impl Into<String>, description: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            kind: AssertionKind::ResponseBody,
            condition: Operator::Exists,
            expected_value: Value::Bool(true),
            field: (!field.is_empty()).then_some(field),
            description: description.into(),
        }
    }

    /// `response_time < seconds`
    #[must_use]
    pub fn response_time_below(seconds: f64, description: impl Into<String>) -> Self {
        Self {
            kind: AssertionKind::ResponseTime,
            condition: Operator::LessThan,
            expected_value: serde_json::json!(seconds),
            field: None,
            description: description.into(),
        }
    }
}

/// A single generated test.
///
/// Single-step cases use `endpoint`/`method`/`payload`. Flow cases carry two
/// or more [`FlowStep`]s and the top-level request fields only describe the
/// case for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    pub name: String,
    #[serde(rename = "type")]
    pub category: TestCategory,
    pub endpoint: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Body fields, or query fields for GET/DELETE.
    #[serde(default = "empty_object")]
    pub payload: Value,
    /// Query parameters sent alongside a body on POST/PUT/PATCH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    /// Path values that take precedence over context and payload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_overrides: BTreeMap<String, String>,
    /// Extra request headers for this case only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body field the engine strips right before dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_field: Option<String>,
    #[serde(default, skip_serializing_if = "BodyEncoding::is_json")]
    pub encoding: BodyEncoding,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_fields: Vec<String>,
    pub expected_status: Vec<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow: Vec<FlowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TestCase {
    #[must_use]
    pub fn new(
        category: TestCategory,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            endpoint: endpoint.into(),
            method: method.into().to_uppercase(),
            operation_id: None,
            description: String::new(),
            payload: empty_object(),
            query: None,
            path_overrides: BTreeMap::new(),
            headers: BTreeMap::new(),
            remove_field: None,
            encoding: BodyEncoding::Json,
            file_fields: Vec::new(),
            expected_status: vec![200],
            assertions: Vec::new(),
            flow: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: Option<Value>) -> Self {
        self.query = query.filter(|q| q.as_object().is_some_and(|o| !o.is_empty()));
        self
    }

    #[must_use]
    pub fn with_path_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_overrides.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_remove_field(mut self, field: impl Into<String>) -> Self {
        self.remove_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: BodyEncoding, file_fields: Vec<String>) -> Self {
        self.encoding = encoding;
        self.file_fields = file_fields;
        self
    }

    #[must_use]
    pub fn with_expected_status(mut self, statuses: Vec<u16>) -> Self {
        self.expected_status = statuses;
        self
    }

    #[must_use]
    pub fn with_assertions(mut self, assertions: Vec<Assertion>) -> Self {
        self.assertions = assertions;
        self
    }

    #[must_use]
    pub fn with_flow(mut self, flow: Vec<FlowStep>) -> Self {
        self.flow = flow;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// True when the case runs as an ordered multi-step flow.
    #[must_use]
    pub fn is_flow(&self) -> bool {
        !self.flow.is_empty()
    }

    /// `"POST /pets"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.endpoint)
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
