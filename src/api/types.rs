use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// HTTP verbs the pipeline issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb carry a body.
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How a successful response body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Bytes,
}

/// Per-request options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Sent as `Accept` and, except for multipart bodies, `Content-Type`.
    pub media_type: String,
    /// Skip the error sink. Unauthenticated errors are reported regardless.
    pub ignore_errors: bool,
    /// Count the request towards the busy indicator.
    pub show_spinner: bool,
    /// Share the in-flight response of identical GET requests.
    pub cache: bool,
    pub response_type: ResponseType,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            media_type: JSON_MEDIA_TYPE.to_string(),
            ignore_errors: false,
            show_spinner: true,
            cache: false,
            response_type: ResponseType::Json,
        }
    }
}

impl RequestOptions {
    pub fn ignore_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    pub fn without_spinner(mut self) -> Self {
        self.show_spinner = false;
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }
}

/// Query string of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
    /// Appended verbatim; the caller is responsible for encoding.
    Raw(String),
    /// Percent-encoded by the pipeline.
    Pairs(Vec<(String, String)>),
}

impl QueryParams {
    /// Pairs from a JSON map. Arrays become repeated keys, nulls are skipped.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut pairs = Vec::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items.iter().filter(|v| !v.is_null()) {
                        pairs.push((key.clone(), query_value(item)));
                    }
                }
                other => pairs.push((key.clone(), query_value(other))),
            }
        }
        Self::Pairs(pairs)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(raw) => raw.is_empty(),
            Self::Pairs(pairs) => pairs.is_empty(),
        }
    }
}

/// Text form of a scalar used in URLs and query strings.
pub fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<&str> for QueryParams {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.trim_start_matches('?').to_string())
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for QueryParams {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request payload.
pub enum RequestBody {
    Json(Value),
    Text(String),
    /// The transport sets `Content-Type` with its own boundary.
    Multipart(reqwest::multipart::Form),
}

impl RequestBody {
    /// Text recorded in error details.
    pub fn describe(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Multipart(_) => "<multipart form>".to_string(),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Multipart(_) => f.write_str("Multipart(..)"),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Successful response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// 204 or a zero-length body.
    Empty,
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}
