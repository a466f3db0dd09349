use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to list of messages, as returned by validation errors and
/// model validators.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Decode error at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service '{service}' has no method '{method}'")]
    UnknownMethod { service: String, method: String },

    #[error("Missing path parameter '{param}' for {template}")]
    MissingPathParam { param: String, template: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The classified request error, if this error came from the transport.
    pub fn as_request_error(&self) -> Option<&RequestError> {
        match self {
            Self::Request(err) => Some(err),
            _ => None,
        }
    }

    /// Get user-friendly hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Request(err) => match err.kind {
                ErrorKind::Unauthenticated => Some(
                    "Your session has expired. Log in again and run: \
                     gateway config set server.session_id YOUR_SESSION"
                        .to_string(),
                ),
                ErrorKind::Unauthorized => {
                    Some("Your account is not allowed to perform this operation.".to_string())
                }
                ErrorKind::NetworkFailure => {
                    Some("Check your internet connection and the server URL.".to_string())
                }
                ErrorKind::Validation => {
                    Some("Fix the fields listed above and try again.".to_string())
                }
                _ => None,
            },
            Self::UnknownService(_) | Self::UnknownMethod { .. } => {
                Some("Run 'gateway services' to list the available operations.".to_string())
            }
            Self::Config(_) => Some("Run 'gateway config path' to locate the configuration file.".to_string()),
            _ => None,
        }
    }

    /// Check if the error is retryable. Nothing in the crate retries; this
    /// is for callers that implement their own policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(err) => {
                err.kind == ErrorKind::NetworkFailure
                    || err.details.status.is_some_and(|s| s >= 500 || s == 429)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received.
    NetworkFailure,
    /// HTTP 400 with a field-keyed body.
    Validation,
    /// Error body carrying a `detail` key.
    ApiException,
    /// API exception with status 403.
    Unauthorized,
    /// API exception with status 404.
    NotFound,
    /// 401/403 with `is_authenticated: false`; the session is gone.
    Unauthenticated,
    /// Any other non-2xx response.
    Http,
    /// 2xx response whose body could not be read as requested.
    InvalidResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetails {
    pub url: String,
    /// Request body, when one was sent.
    pub body: Option<String>,
    /// `None` when no response was received.
    pub status: Option<u16>,
    /// Parsed error body, or its raw text as a JSON string.
    pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: ErrorDetails,
}

impl RequestError {
    pub fn network(url: impl Into<String>, body: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NetworkFailure,
            message: message.into(),
            details: ErrorDetails {
                url: url.into(),
                body,
                status: None,
                response: None,
            },
        }
    }

    pub fn invalid_response(
        url: impl Into<String>,
        body: Option<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidResponse,
            message: message.into(),
            details: ErrorDetails {
                url: url.into(),
                body,
                status: Some(status),
                response: None,
            },
        }
    }

    /// Build a classified error from a non-2xx response. `raw_text` is used
    /// when the body is not JSON.
    pub fn from_response(
        url: impl Into<String>,
        body: Option<String>,
        status: u16,
        response: Option<Value>,
        raw_text: &str,
    ) -> Self {
        let kind = classify(status, response.as_ref());
        let message = match (&kind, response.as_ref()) {
            (
                ErrorKind::ApiException | ErrorKind::Unauthorized | ErrorKind::NotFound | ErrorKind::Unauthenticated,
                Some(Value::Object(map)),
            ) if map.contains_key("detail") => match &map["detail"] {
                Value::String(detail) => detail.clone(),
                other => other.to_string(),
            },
            (_, Some(value)) => value.to_string(),
            (_, None) if !raw_text.trim().is_empty() => raw_text.to_string(),
            (_, None) => StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}")),
        };
        let response = response.or_else(|| {
            (!raw_text.is_empty()).then(|| Value::String(raw_text.to_string()))
        });

        Self {
            kind,
            message,
            details: ErrorDetails {
                url: url.into(),
                body,
                status: Some(status),
                response,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.details.status
    }

    /// Unauthorized and NotFound are API exceptions with a specific status.
    pub fn is_api_exception(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ApiException | ErrorKind::Unauthorized | ErrorKind::NotFound
        )
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.kind == ErrorKind::Unauthenticated
    }

    /// Field-level messages of a validation error. Non-list values are
    /// wrapped, nested objects are flattened with dotted names.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        if !self.is_validation_error() {
            return None;
        }
        let Some(Value::Object(map)) = &self.details.response else {
            return None;
        };
        let mut errors = FieldErrors::new();
        collect_field_errors("", map, &mut errors);
        Some(errors)
    }
}

fn collect_field_errors(prefix: &str, map: &serde_json::Map<String, Value>, out: &mut FieldErrors) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => collect_field_errors(&name, nested, out),
            Value::Array(items) => {
                let messages = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                out.insert(name, messages);
            }
            Value::String(s) => {
                out.insert(name, vec![s.clone()]);
            }
            other => {
                out.insert(name, vec![other.to_string()]);
            }
        }
    }
}

/// Classify a non-2xx response from its status and parsed body.
pub fn classify(status: u16, response: Option<&Value>) -> ErrorKind {
    let body = response.and_then(Value::as_object);
    let unauthenticated = body
        .and_then(|b| b.get("is_authenticated"))
        .is_some_and(|v| v == &Value::Bool(false));
    if (status == 401 || status == 403) && unauthenticated {
        return ErrorKind::Unauthenticated;
    }
    if body.is_some_and(|b| b.contains_key("detail")) {
        return match status {
            403 => ErrorKind::Unauthorized,
            404 => ErrorKind::NotFound,
            _ => ErrorKind::ApiException,
        };
    }
    if status == 400 && body.is_some() {
        return ErrorKind::Validation;
    }
    ErrorKind::Http
}
