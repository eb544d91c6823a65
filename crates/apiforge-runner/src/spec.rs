//! OpenAPI / Swagger document resolution
//!
//! Loads a JSON or YAML document, validates that it is OpenAPI 3.x or
//! Swagger 2.0, expands every local `$ref`, and extracts one
//! [`EndpointDescriptor`] per (path, method).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use apiforge_core::{BodyEncoding, EndpointFilter};

/// Maximum number of nested `$ref` hops followed during expansion.
const MAX_REF_DEPTH: u32 = 20;

/// Operation keys, in extraction order.
const METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    Swagger2,
    OpenApi3,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

impl ParamLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: Value,
    pub description: String,
    /// Array values are sent as repeated keys (`?status=a&status=b`).
    pub multi: bool,
}

impl Parameter {
    #[must_use]
    pub fn schema_type(&self) -> &str {
        self.schema
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("string")
    }

    /// Enum values of the parameter or of its array items.
    #[must_use]
    pub fn enum_values(&self) -> Option<&Vec<Value>> {
        self.schema
            .get("enum")
            .or_else(|| self.schema.get("items").and_then(|i| i.get("enum")))
            .and_then(Value::as_array)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub content_type: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub required: bool,
    pub content: Vec<MediaType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// Status key as written: `"200"`, `"2XX"`, `"default"`.
    pub status: String,
    pub description: String,
    pub schema: Option<Value>,
}

impl ResponseSpec {
    /// Numeric status; `2XX`-style ranges map to their `x00` code.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        if let Ok(code) = self.status.parse::<u16>() {
            return Some(code);
        }
        let mut chars = self.status.chars();
        let first = chars.next()?.to_digit(10)?;
        let rest: String = chars.collect();
        rest.eq_ignore_ascii_case("xx")
            .then(|| u16::try_from(first * 100).ok())
            .flatten()
    }
}

/// Body schema selected for request generation.
#[derive(Debug, Clone, Copy)]
pub struct BodyTarget<'a> {
    pub encoding: BodyEncoding,
    pub content_type: &'a str,
    pub schema: &'a Value,
}

/// One (path, method) operation with every reference expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub path: String,
    /// Uppercase
    pub method: String,
    /// Declared `operationId`, or `"{METHOD}_{path}"`.
    pub operation_id: String,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: Vec<ResponseSpec>,
}

impl EndpointDescriptor {
    /// `"POST /pets"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn params_in(&self, location: ParamLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// First path segment, e.g. `pet` for `/pet/{petId}/uploadImage`.
    #[must_use]
    pub fn resource(&self) -> &str {
        resource_of(&self.path)
    }

    #[must_use]
    pub fn has_path_params(&self) -> bool {
        self.path.contains('{')
    }

    /// Request body schema, preferring JSON over form over multipart over raw bytes.
    #[must_use]
    pub fn body_target(&self) -> Option<BodyTarget<'_>> {
        let body = self.request_body.as_ref()?;
        let rank = |ct: &str| -> (u8, BodyEncoding) {
            let ct = ct.to_ascii_lowercase();
            if ct == "application/json" {
                (0, BodyEncoding::Json)
            } else if ct.contains("json") {
                (1, BodyEncoding::Json)
            } else if ct == "application/x-www-form-urlencoded" {
                (2, BodyEncoding::Form)
            } else if ct.starts_with("multipart/") {
                (3, BodyEncoding::Multipart)
            } else if ct == "application/octet-stream" || ct.starts_with("image/") {
                (4, BodyEncoding::Binary)
            } else {
                (5, BodyEncoding::Json)
            }
        };
        body.content
            .iter()
            .min_by_key(|m| rank(&m.content_type).0)
            .map(|m| BodyTarget {
                encoding: rank(&m.content_type).1,
                content_type: &m.content_type,
                schema: &m.schema,
            })
    }

    /// Properties of an object body schema (including `allOf` members).
    #[must_use]
    pub fn body_properties(&self) -> Map<String, Value> {
        self.body_target()
            .map(|t| object_properties(t.schema))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn required_body_fields(&self) -> Vec<String> {
        self.body_target()
            .map(|t| required_fields(t.schema))
            .unwrap_or_default()
    }

    /// Multipart fields carrying file content.
    #[must_use]
    pub fn file_fields(&self) -> Vec<String> {
        match self.body_target() {
            Some(t) if t.encoding == BodyEncoding::Multipart => object_properties(t.schema)
                .iter()
                .filter(|(name, schema)| {
                    let format = schema.get("format").and_then(Value::as_str);
                    matches!(format, Some("binary" | "base64"))
                        || name.to_ascii_lowercase().contains("file")
                })
                .map(|(name, _)| name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Upload-shaped endpoint: path mentions upload/image or the body is a file.
    #[must_use]
    pub fn is_upload(&self) -> bool {
        let lower = self.path.to_ascii_lowercase();
        lower.contains("upload")
            || lower.contains("image")
            || self
                .body_target()
                .is_some_and(|t| t.encoding == BodyEncoding::Binary)
            || !self.file_fields().is_empty()
    }

    /// Declared status codes in document order.
    #[must_use]
    pub fn declared_statuses(&self) -> Vec<u16> {
        self.responses.iter().filter_map(ResponseSpec::code).collect()
    }

    #[must_use]
    pub fn response(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses.iter().find(|r| r.code() == Some(status))
    }
}

/// First non-empty path segment.
#[must_use]
pub fn resource_of(path: &str) -> &str {
    path.split('/').find(|s| !s.is_empty()).unwrap_or("")
}

/// Properties of an object schema, merging `allOf` members.
#[must_use]
pub fn object_properties(schema: &Value) -> Map<String, Value> {
    let mut props = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        for member in all_of {
            props.extend(object_properties(member));
        }
    }
    props
}

/// `required` list of an object schema, merging `allOf` members.
#[must_use]
pub fn required_fields(schema: &Value) -> Vec<String> {
    let mut required: Vec<String> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        for member in all_of {
            for field in required_fields(member) {
                if !required.contains(&field) {
                    required.push(field);
                }
            }
        }
    }
    required
}

/// A validated document with all local references expanded.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    document: Value,
    version: SpecVersion,
    source: Option<PathBuf>,
    endpoints: Vec<EndpointDescriptor>,
}

impl ResolvedSpec {
    /// Endpoints in document order.
    #[must_use]
    pub fn get_endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    /// Endpoints matching any filter; an empty filter list selects all.
    #[must_use]
    pub fn select(&self, filters: &[EndpointFilter]) -> Vec<&EndpointDescriptor> {
        self.endpoints
            .iter()
            .filter(|e| filters.is_empty() || filters.iter().any(|f| f.matches(&e.method, &e.path)))
            .collect()
    }

    #[must_use]
    pub fn find_endpoint(&self, method: &str, path: &str) -> Option<&EndpointDescriptor> {
        self.endpoints
            .iter()
            .find(|e| e.path == path && e.method.eq_ignore_ascii_case(method))
    }

    /// Resolve a local JSON pointer such as `#/components/schemas/Pet`.
    ///
    /// # Errors
    ///
    /// Returns error for external or malformed references, or when a pointer
    /// segment does not exist.
    pub fn resolve_ref(&self, reference: &str) -> Result<&Value, ReferenceError> {
        resolve_pointer(&self.document, reference)
    }

    /// Named schemas (`components.schemas` or `definitions`).
    #[must_use]
    pub fn schemas(&self) -> BTreeMap<&str, &Value> {
        let section = match self.version {
            SpecVersion::OpenApi3 => self.document.pointer("/components/schemas"),
            SpecVersion::Swagger2 => self.document.get("definitions"),
        };
        section
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn version(&self) -> SpecVersion {
        self.version
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The expanded document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

pub struct SpecResolver;

impl SpecResolver {
    /// Read, parse, and resolve a document from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON/YAML, or is
    /// not a supported OpenAPI/Swagger document.
    pub fn parse_file(path: &Path) -> Result<ResolvedSpec, SchemaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(path.to_path_buf(), e.to_string()))?;
        let document = parse_spec(path, &content)?;
        let mut resolved = Self::parse_document(document)?;
        resolved.source = Some(path.to_path_buf());
        Ok(resolved)
    }

    /// Resolve an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns error if the document is not OpenAPI 3.x / Swagger 2.0, has no
    /// `paths` object, or contains an external `$ref`.
    pub fn parse_document(document: Value) -> Result<ResolvedSpec, SchemaError> {
        let version = detect_version(&document)?;
        if !document.get("paths").is_some_and(Value::is_object) {
            return Err(SchemaError::Invalid("missing `paths` object".into()));
        }

        let mut stack = Vec::new();
        let expanded = expand(&document, &document, &mut stack, 0)?;
        let endpoints = extract_endpoints(&expanded, version);
        tracing::debug!(
            endpoints = endpoints.len(),
            version = ?version,
            "resolved API document"
        );

        Ok(ResolvedSpec {
            document: expanded,
            version,
            source: None,
            endpoints,
        })
    }
}

fn detect_version(document: &Value) -> Result<SpecVersion, SchemaError> {
    if let Some(v) = document.get("openapi").and_then(Value::as_str) {
        if v.starts_with("3.") {
            return Ok(SpecVersion::OpenApi3);
        }
        return Err(SchemaError::Unsupported(format!("openapi {v}")));
    }
    match document.get("swagger") {
        Some(Value::String(v)) if v.starts_with("2.") => Ok(SpecVersion::Swagger2),
        Some(other) => Err(SchemaError::Unsupported(format!("swagger {other}"))),
        None => Err(SchemaError::Unsupported(
            "no `openapi` or `swagger` version field".into(),
        )),
    }
}

/// Parse an API document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
pub fn parse_spec(path: &Path, content: &str) -> Result<Value, SchemaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parse_json = |c: &str| -> Result<Value, SchemaError> {
        serde_json::from_str(c).map_err(|e| SchemaError::Json(e.to_string()))
    };
    let parse_yaml = |c: &str| -> Result<Value, SchemaError> {
        serde_yml::from_str(c).map_err(|e| SchemaError::Yaml(e.to_string()))
    };

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => parse_json(content),
        _ if content.trim_start().starts_with('{') => parse_json(content),
        _ => parse_yaml(content),
    }
}

/// Recursively replace local `$ref` objects with their targets.
///
/// A reference already on the expansion stack is left in place, so cyclic
/// schemas terminate. Unresolvable local references are left in place too.
fn expand(
    node: &Value,
    root: &Value,
    stack: &mut Vec<String>,
    depth: u32,
) -> Result<Value, SchemaError> {
    match node {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                if !reference.starts_with('#') {
                    return Err(SchemaError::ExternalRef(reference.to_string()));
                }
                if depth >= MAX_REF_DEPTH || stack.iter().any(|r| r == reference) {
                    return Ok(node.clone());
                }
                return match resolve_pointer(root, reference) {
                    Ok(target) => {
                        stack.push(reference.to_string());
                        let out = expand(target, root, stack, depth + 1);
                        stack.pop();
                        out
                    }
                    Err(e) => {
                        tracing::warn!(reference, error = %e, "leaving unresolved reference in place");
                        Ok(node.clone())
                    }
                };
            }
            let mut out = Map::with_capacity(obj.len());
            for (k, v) in obj {
                out.insert(k.clone(), expand(v, root, stack, depth)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| expand(v, root, stack, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Ok(node.clone()),
    }
}

fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, ReferenceError> {
    let Some(pointer) = reference.strip_prefix('#') else {
        return Err(ReferenceError::External(reference.to_string()));
    };
    if pointer.is_empty() {
        return Ok(root);
    }
    let Some(pointer) = pointer.strip_prefix('/') else {
        return Err(ReferenceError::Malformed(reference.to_string()));
    };

    let mut current = root;
    for raw in pointer.split('/') {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| ReferenceError::Missing {
            reference: reference.to_string(),
            segment: segment.clone(),
        })?;
    }
    Ok(current)
}

fn extract_endpoints(document: &Value, version: SpecVersion) -> Vec<EndpointDescriptor> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let global_consumes = string_list(document.get("consumes"));

    let mut endpoints = Vec::new();
    for (path, path_item) in paths {
        for method in METHODS {
            let Some(operation) = path_item.get(method).filter(|o| o.is_object()) else {
                continue;
            };
            endpoints.push(extract_endpoint(
                path,
                method,
                path_item,
                operation,
                version,
                &global_consumes,
            ));
        }
    }
    endpoints
}

fn extract_endpoint(
    path: &str,
    method: &str,
    path_item: &Value,
    operation: &Value,
    version: SpecVersion,
    global_consumes: &[String],
) -> EndpointDescriptor {
    let text = |key: &str| {
        operation
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let method_upper = method.to_uppercase();
    let operation_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map_or_else(|| format!("{method_upper}_{path}"), String::from);

    // Operation-level parameters override path-level ones with the same (name, in).
    let mut raw_params: Vec<&Value> = Vec::new();
    for source in [path_item.get("parameters"), operation.get("parameters")]
        .into_iter()
        .flatten()
    {
        for param in source.as_array().into_iter().flatten() {
            let key = (param.get("name"), param.get("in"));
            raw_params.retain(|p| (p.get("name"), p.get("in")) != key);
            raw_params.push(param);
        }
    }

    let (parameters, request_body) = match version {
        SpecVersion::OpenApi3 => (
            raw_params.iter().filter_map(|p| parse_parameter_v3(p)).collect(),
            operation.get("requestBody").map(parse_request_body_v3),
        ),
        SpecVersion::Swagger2 => {
            let consumes = {
                let op = string_list(operation.get("consumes"));
                if op.is_empty() { global_consumes.to_vec() } else { op }
            };
            split_parameters_v2(&raw_params, &consumes)
        }
    };

    let responses = operation
        .get("responses")
        .and_then(Value::as_object)
        .map(|r| {
            r.iter()
                .map(|(status, resp)| ResponseSpec {
                    status: status.clone(),
                    description: resp
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    schema: response_schema(resp, version),
                })
                .collect()
        })
        .unwrap_or_default();

    EndpointDescriptor {
        path: path.to_string(),
        method: method_upper,
        operation_id,
        summary: text("summary"),
        description: text("description"),
        tags: string_list(operation.get("tags")),
        parameters,
        request_body,
        responses,
    }
}

fn parse_parameter_v3(param: &Value) -> Option<Parameter> {
    let name = param.get("name")?.as_str()?.to_string();
    let location = ParamLocation::parse(param.get("in")?.as_str()?)?;
    let schema = param
        .get("schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));
    let is_array = schema.get("type").and_then(Value::as_str) == Some("array");
    let explode = param
        .get("explode")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Some(Parameter {
        required: location == ParamLocation::Path
            || param.get("required").and_then(Value::as_bool).unwrap_or(false),
        multi: is_array && location == ParamLocation::Query && explode,
        description: param
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        name,
        location,
        schema,
    })
}

fn parse_request_body_v3(body: &Value) -> RequestBody {
    let content = body
        .get("content")
        .and_then(Value::as_object)
        .map(|c| {
            c.iter()
                .map(|(ct, media)| MediaType {
                    content_type: ct.clone(),
                    schema: media.get("schema").cloned().unwrap_or_else(|| json!({})),
                })
                .collect()
        })
        .unwrap_or_default();
    RequestBody {
        required: body
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        content,
    }
}

/// Swagger 2 keeps body and form fields in the parameter list.
fn split_parameters_v2(
    raw: &[&Value],
    consumes: &[String],
) -> (Vec<Parameter>, Option<RequestBody>) {
    let mut parameters = Vec::new();
    let mut body: Option<RequestBody> = None;
    let mut form_props = Map::new();
    let mut form_required: Vec<Value> = Vec::new();
    let mut has_file = false;

    for param in raw {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let required = param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        match param.get("in").and_then(Value::as_str) {
            Some("body") => {
                let content_type = consumes
                    .iter()
                    .find(|c| c.contains("json"))
                    .cloned()
                    .unwrap_or_else(|| "application/json".to_string());
                body = Some(RequestBody {
                    required,
                    content: vec![MediaType {
                        content_type,
                        schema: param.get("schema").cloned().unwrap_or_else(|| json!({})),
                    }],
                });
            }
            Some("formData") => {
                let mut schema = schema_from_v2_param(param);
                if param.get("type").and_then(Value::as_str) == Some("file") {
                    has_file = true;
                    schema = json!({"type": "string", "format": "binary"});
                }
                form_props.insert(name.to_string(), schema);
                if required {
                    form_required.push(Value::String(name.to_string()));
                }
            }
            Some(loc) => {
                let Some(location) = ParamLocation::parse(loc) else {
                    continue;
                };
                let schema = schema_from_v2_param(param);
                let is_array = schema.get("type").and_then(Value::as_str) == Some("array");
                parameters.push(Parameter {
                    name: name.to_string(),
                    location,
                    required: location == ParamLocation::Path || required,
                    multi: is_array
                        && param.get("collectionFormat").and_then(Value::as_str) == Some("multi"),
                    description: param
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    schema,
                });
            }
            None => {}
        }
    }

    if body.is_none() && !form_props.is_empty() {
        let content_type = if has_file || consumes.iter().any(|c| c.starts_with("multipart/")) {
            "multipart/form-data"
        } else {
            "application/x-www-form-urlencoded"
        };
        body = Some(RequestBody {
            required: !form_required.is_empty(),
            content: vec![MediaType {
                content_type: content_type.to_string(),
                schema: json!({
                    "type": "object",
                    "properties": form_props,
                    "required": form_required,
                }),
            }],
        });
    }

    (parameters, body)
}

/// Swagger 2 non-body parameters carry their schema keywords inline.
fn schema_from_v2_param(param: &Value) -> Value {
    const KEYWORDS: [&str; 12] = [
        "type",
        "format",
        "enum",
        "items",
        "default",
        "minimum",
        "maximum",
        "minLength",
        "maxLength",
        "pattern",
        "minItems",
        "maxItems",
    ];
    let mut schema = Map::new();
    for key in KEYWORDS {
        if let Some(v) = param.get(key) {
            schema.insert(key.to_string(), v.clone());
        }
    }
    if !schema.contains_key("type") {
        schema.insert("type".into(), json!("string"));
    }
    Value::Object(schema)
}

fn response_schema(response: &Value, version: SpecVersion) -> Option<Value> {
    match version {
        SpecVersion::Swagger2 => response.get("schema").cloned(),
        SpecVersion::OpenApi3 => {
            let content = response.get("content")?.as_object()?;
            content
                .get("application/json")
                .or_else(|| {
                    content
                        .iter()
                        .find(|(ct, _)| ct.contains("json"))
                        .map(|(_, m)| m)
                })
                .or_else(|| content.values().next())
                .and_then(|m| m.get("schema"))
                .cloned()
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// The document could not be loaded or is not a supported API description.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Invalid JSON: {0}")]
    Json(String),
    #[error("Invalid YAML: {0}")]
    Yaml(String),
    #[error("Unsupported document: {0}")]
    Unsupported(String),
    #[error("Invalid document: {0}")]
    Invalid(String),
    #[error("External reference not supported: {0}")]
    ExternalRef(String),
}

/// A `$ref` could not be followed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("external reference not supported: {0}")]
    External(String),
    #[error("malformed reference: {0}")]
    Malformed(String),
    #[error("unresolved reference {reference}: no '{segment}'")]
    Missing { reference: String, segment: String },
}
