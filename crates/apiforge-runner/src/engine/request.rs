//! Request assembly and dispatch for one step

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::{Map, Value};

use apiforge_core::{
    BodyEncoding, FlowStep, Fixtures, RequestSnapshot, ResponseSnapshot, TestCase, TestCategory,
};

use super::ExecutionError;
use super::auth::Authenticator;
use super::checks::Exchange;
use super::context::ExecutionContext;
use super::params::{build_url, resolve_path_values};
use crate::datagen::{uses_query_payload, value_to_param_string};
use crate::spec::resource_of;

/// Headers kept per trace snapshot.
const MAX_TRACE_HEADERS: usize = 25;
/// Characters kept of a traced response body.
const MAX_TRACE_BODY_CHARS: usize = 2000;
const EMPTY_BODY: &str = "(empty response body)";

/// Placeholder file sent to upload endpoints: a minimal JFIF image.
const PLACEHOLDER_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
    0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];
const PLACEHOLDER_NAME: &str = "test.jpg";
const PLACEHOLDER_MIME: &str = "image/jpeg";
/// Part name used when an upload endpoint declares no file field.
const DEFAULT_FILE_FIELD: &str = "file";

static NO_STRINGS: BTreeMap<String, String> = BTreeMap::new();

/// Path looks like a file-upload endpoint.
#[must_use]
pub fn is_upload_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("upload") || lower.contains("image")
}

/// Everything needed to send one request, borrowed from a case or flow step.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    pub category: TestCategory,
    pub method: &'a str,
    pub endpoint: &'a str,
    pub payload: &'a Value,
    pub query: Option<&'a Value>,
    pub encoding: BodyEncoding,
    pub file_fields: &'a [String],
    pub headers: &'a BTreeMap<String, String>,
    pub path_overrides: &'a BTreeMap<String, String>,
    pub remove_field: Option<&'a str>,
}

impl<'a> StepRequest<'a> {
    #[must_use]
    pub fn from_case(case: &'a TestCase) -> Self {
        Self {
            category: case.category,
            method: &case.method,
            endpoint: &case.endpoint,
            payload: &case.payload,
            query: case.query.as_ref(),
            encoding: case.encoding,
            file_fields: &case.file_fields,
            headers: &case.headers,
            path_overrides: &case.path_overrides,
            remove_field: case.remove_field.as_deref(),
        }
    }

    /// Flow steps carry no overrides; headers come from the owning case.
    #[must_use]
    pub fn from_step(case: &'a TestCase, step: &'a FlowStep) -> Self {
        Self {
            category: case.category,
            method: &step.method,
            endpoint: &step.endpoint,
            payload: &step.payload,
            query: step.query.as_ref(),
            encoding: step.encoding,
            file_fields: &step.file_fields,
            headers: &case.headers,
            path_overrides: &NO_STRINGS,
            remove_field: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<String>,
    },
    /// Raw upload; carries the placeholder image when set.
    Binary(bool),
}

impl Body {
    fn describe(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Json(v) => Some(v.to_string()),
            Self::Form(pairs) => Some(
                pairs
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
            Self::Multipart { fields, files } => {
                let mut parts: Vec<String> =
                    fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
                parts.extend(
                    files
                        .iter()
                        .map(|f| format!("{f}=@{PLACEHOLDER_NAME} ({PLACEHOLDER_MIME})")),
                );
                Some(format!("multipart: {}", parts.join(", ")))
            }
            Self::Binary(true) => Some(format!("@{PLACEHOLDER_NAME} ({PLACEHOLDER_MIME})")),
            Self::Binary(false) => None,
        }
    }
}

/// A request with every placeholder resolved.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub method: reqwest::Method,
    pub url: reqwest::Url,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

fn query_pairs(fields: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|v| (key.clone(), value_to_param_string(v))));
            }
            other => pairs.push((key.clone(), value_to_param_string(other))),
        }
    }
    pairs
}

fn form_pairs(fields: &Map<String, Value>, skip: &[String]) -> Vec<(String, String)> {
    fields
        .iter()
        .filter(|(k, v)| !skip.contains(k) && !v.is_null())
        .map(|(k, v)| (k.clone(), value_to_param_string(v)))
        .collect()
}

/// Resolve placeholders and split payload fields into query and body.
///
/// # Errors
///
/// Returns error if the method or base URL is unusable.
pub fn prepare(
    step: &StepRequest<'_>,
    base_url: &str,
    static_headers: &BTreeMap<String, String>,
    context: &ExecutionContext,
    fixtures: &Fixtures,
    rng: &mut impl Rng,
) -> Result<Prepared, ExecutionError> {
    let method = reqwest::Method::from_bytes(step.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| {
            ExecutionError::InvalidRequest(format!(
                "invalid HTTP method '{}' for {}",
                step.method, step.endpoint
            ))
        })?;
    let resource = resource_of(step.endpoint);
    let query_method = uses_query_payload(step.method);

    let mut fields = step.payload.as_object().cloned().unwrap_or_default();
    if let Some(field) = step.remove_field {
        fields.remove(field);
    }

    let path_values = resolve_path_values(
        step.endpoint,
        resource,
        step.path_overrides,
        context,
        &mut fields,
        query_method,
        rng,
    );
    let url = build_url(base_url, step.endpoint, &path_values)?;

    let mut query = Map::new();
    if let Some(Value::Object(extra)) = step.query {
        query.extend(extra.clone());
    }

    let upload = is_upload_path(step.endpoint);
    let attach = upload && !step.category.seeks_rejection();
    let body = if query_method {
        query.extend(fields);
        Body::Empty
    } else {
        match step.encoding {
            BodyEncoding::Json => {
                if fields.is_empty() && method == reqwest::Method::PUT {
                    if let Some(fixture) = fixtures.get(resource) {
                        fields = fixture.as_object().cloned().unwrap_or_default();
                    }
                }
                match step.payload {
                    Value::Object(_) => Body::Json(Value::Object(fields)),
                    Value::Null => Body::Empty,
                    other => Body::Json(other.clone()),
                }
            }
            BodyEncoding::Form => Body::Form(form_pairs(&fields, &[])),
            BodyEncoding::Multipart => {
                let mut files: Vec<String> = step.file_fields.to_vec();
                if files.is_empty() && upload {
                    files.push(DEFAULT_FILE_FIELD.to_string());
                }
                Body::Multipart {
                    fields: form_pairs(&fields, &files),
                    files: if attach { files } else { Vec::new() },
                }
            }
            BodyEncoding::Binary => Body::Binary(attach),
        }
    };

    let mut headers: Vec<(String, String)> = static_headers
        .iter()
        .chain(step.headers.iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Body::Binary(_) = body {
        headers.push((
            "Content-Type".to_string(),
            BodyEncoding::Binary.content_type().to_string(),
        ));
    }

    Ok(Prepared {
        method,
        url,
        query: query_pairs(&query),
        headers,
        body,
    })
}

/// Truncate at a char boundary, noting the original size.
fn truncate_body(text: &str) -> String {
    if text.is_empty() {
        return EMPTY_BODY.to_string();
    }
    match text.char_indices().nth(MAX_TRACE_BODY_CHARS) {
        None => text.to_string(),
        Some((end, _)) => format!("{}…({} bytes total)", &text[..end], text.len()),
    }
}

fn header_snapshot(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .take(MAX_TRACE_HEADERS)
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
        .collect()
}

/// Outcome of sending one prepared request.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
    pub exchange: Exchange,
}

fn multipart_form(
    fields: &[(String, String)],
    files: &[String],
) -> Result<reqwest::blocking::multipart::Form, ExecutionError> {
    let mut form = reqwest::blocking::multipart::Form::new();
    for (k, v) in fields {
        form = form.text(k.clone(), v.clone());
    }
    for name in files {
        let part = reqwest::blocking::multipart::Part::bytes(PLACEHOLDER_JPEG.to_vec())
            .file_name(PLACEHOLDER_NAME)
            .mime_str(PLACEHOLDER_MIME)
            .map_err(|e| ExecutionError::InvalidRequest(e.to_string()))?;
        form = form.part(name.clone(), part);
    }
    Ok(form)
}

/// Send `prepared`, applying auth, and capture the exchange.
///
/// # Errors
///
/// Returns error on auth failure, timeout, or transport failure.
pub fn dispatch(
    client: &reqwest::blocking::Client,
    auth: Option<&mut Authenticator>,
    prepared: Prepared,
    timeout: Duration,
) -> Result<Dispatched, ExecutionError> {
    let body_snapshot = prepared.body.describe();
    let mut req = client
        .request(prepared.method.clone(), prepared.url.clone())
        .timeout(timeout);
    if !prepared.query.is_empty() {
        req = req.query(&prepared.query);
    }
    for (k, v) in &prepared.headers {
        // Values invalid in HTTP never reach the server.
        if reqwest::header::HeaderValue::from_str(v).is_ok() {
            req = req.header(k.as_str(), v.as_str());
        }
    }
    if let Some(auth) = auth {
        req = auth.apply(client, req)?;
    }
    req = match prepared.body {
        Body::Empty | Body::Binary(false) => req,
        Body::Json(v) => req.json(&v),
        Body::Form(pairs) => req.form(&pairs),
        Body::Multipart { fields, files } => req.multipart(multipart_form(&fields, &files)?),
        Body::Binary(true) => req.body(PLACEHOLDER_JPEG.to_vec()),
    };

    let request = req
        .build()
        .map_err(|e| ExecutionError::InvalidRequest(e.to_string()))?;
    let request_snapshot = RequestSnapshot {
        method: request.method().to_string(),
        url: request.url().to_string(),
        headers: header_snapshot(request.headers()),
        body: body_snapshot,
    };

    let start = Instant::now();
    let resp = client.execute(request).map_err(|e| {
        if e.is_timeout() {
            ExecutionError::Timeout(request_snapshot.url.clone())
        } else {
            ExecutionError::Transport(e.to_string())
        }
    })?;
    let status = resp.status().as_u16();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_ascii_lowercase(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let header_snapshot = header_snapshot(resp.headers());
    let body_text = resp
        .text()
        .map_err(|e| ExecutionError::Transport(e.to_string()))?;
    let elapsed = start.elapsed();

    let body_json = serde_json::from_str(&body_text).ok();
    let response = ResponseSnapshot {
        status_code: status,
        headers: header_snapshot,
        body: truncate_body(&body_text),
        latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    };
    Ok(Dispatched {
        request: request_snapshot,
        response,
        exchange: Exchange {
            status,
            headers,
            body_text,
            body_json,
            elapsed,
        },
    })
}
