use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an OpenAPI document can declare operations for.
///
/// The variant order is the fixed order in which a path item's operations
/// are listed by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Lowercase key used for this method inside an OpenAPI path item.
    pub fn spec_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }

    /// Methods that change server state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// Identity of a declared operation: (method, path template).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    pub method: HttpMethod,
    pub path_template: String,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_template)
    }
}

/// One (method, path template) pair declared by the specification document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredOperation {
    pub path_template: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl DeclaredOperation {
    pub fn new(method: HttpMethod, path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
            method,
            operation_id: None,
            summary: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> OperationKey {
        OperationKey {
            method: self.method,
            path_template: self.path_template.clone(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for DeclaredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_template)
    }
}

/// A record of one HTTP call made while testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub method: String,
    pub url: String,
    /// Milliseconds since the Unix epoch at which the call was issued.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Observation {
    /// Observation stamped with the current wall-clock time.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            timestamp: Utc::now().timestamp_millis(),
            query_params: None,
            headers: None,
            status: None,
            duration_ms: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_query_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.query_params = (!params.is_empty()).then_some(params);
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = (!headers.is_empty()).then_some(headers);
        self
    }

    /// Upper-cased method as used for matching and counting.
    pub fn normalized_method(&self) -> String {
        self.method.trim().to_ascii_uppercase()
    }

    /// Path component of the observed URL; scheme, host and query are dropped.
    pub fn path(&self) -> String {
        url_path(&self.url)
    }

    /// `"METHOD path"` label used for endpoint-level aggregation.
    pub fn endpoint_key(&self) -> String {
        format!("{} {}", self.normalized_method(), self.path())
    }

    pub fn is_error(&self) -> bool {
        self.status.is_some_and(|s| s >= 400)
    }
}

/// Extract the path component of an absolute or relative URL.
///
/// Relative URLs are resolved against a placeholder origin so that
/// `"/users?page=2"` and `"https://h/users"` both yield `"/users"`.
pub fn url_path(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) if parsed.has_host() || parsed.scheme() == "file" => parsed.path().to_string(),
        _ => {
            let base = url::Url::parse("http://localhost/").ok();
            base.and_then(|b| b.join(raw).ok())
                .map(|u| u.path().to_string())
                .unwrap_or_else(|| {
                    let trimmed = raw.split(['?', '#']).next().unwrap_or_default();
                    if trimmed.starts_with('/') {
                        trimmed.to_string()
                    } else {
                        format!("/{}", trimmed)
                    }
                })
        }
    }
}

/// Which observation sequence an analysis or export reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Observations recorded by a single interceptor.
    #[default]
    Local,
    /// Observations recorded by every tracking interceptor in the process.
    Shared,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Local => f.write_str("local"),
            Scope::Shared => f.write_str("shared"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Scope::Local),
            "shared" | "global" => Ok(Scope::Shared),
            other => Err(format!("unknown scope: {}", other)),
        }
    }
}

/// Per-call options passed through to the HTTP collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A call handed to the HTTP collaborator.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Method as issued; generic fetches may use methods outside [`HttpMethod`].
    pub method: String,
    pub url: String,
    pub options: RequestOptions,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            options,
        }
    }
}

/// What the collaborator hands back for a completed call.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
