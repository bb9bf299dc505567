//! Error taxonomy for API handlers.
//!
//! Every error a handler wants to show to a client is an [`ApiError`]: a kind
//! name, a stable numeric code, an HTTP status, a message and optional extra
//! headers. Kinds are declared as static [`ErrDef`] catalog entries; the
//! built-in ones are [`API_ERROR`], [`VALIDATION_ERROR`] and
//! [`QUERY_PARSE_ERROR`]. Applications declare their own with codes ≥ 1000.
//!
//! Anything else a handler fails with is a [`HandlerError::Internal`] and is
//! never rendered as an envelope.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field → messages map carried by validation errors.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Static error definition from catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    /// Kind name rendered in the `error` field of the envelope.
    pub name: &'static str,
    pub code: u32,
    pub status: StatusCode,
    /// Message used when the error is raised without one.
    pub message: &'static str,
}

/// Generic/undefined error kind (code 1).
pub const API_ERROR: ErrDef = ErrDef {
    name: "ApiError",
    code: 1,
    status: StatusCode::BAD_REQUEST,
    message: "Undefined Error",
};

/// Request payload failed validation (code 2); the message is a field map.
pub const VALIDATION_ERROR: ErrDef = ErrDef {
    name: "ValidationError",
    code: 2,
    status: StatusCode::BAD_REQUEST,
    message: "Validation Error",
};

/// A typed query parameter could not be converted (code 3).
pub const QUERY_PARSE_ERROR: ErrDef = ErrDef {
    name: "QueryParseError",
    code: 3,
    status: StatusCode::BAD_REQUEST,
    message: "Query Parse Error",
};

impl ErrDef {
    /// Raise this kind with its catalog message.
    #[inline]
    pub fn error(&self) -> ApiError {
        ApiError::from_def(self, ErrorMessage::Text(self.message.to_string()))
    }

    /// Raise this kind with a specific message.
    #[inline]
    pub fn with_message(&self, message: impl Into<ErrorMessage>) -> ApiError {
        ApiError::from_def(self, message.into())
    }
}

/// Error message: plain text, or per-field messages for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(FieldErrors),
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.write_str(text),
            ErrorMessage::Fields(fields) => {
                let mut first = true;
                for (field, messages) in fields {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    write!(f, "{}: {}", field, messages.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        ErrorMessage::Text(text)
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

impl From<FieldErrors> for ErrorMessage {
    fn from(fields: FieldErrors) -> Self {
        ErrorMessage::Fields(fields)
    }
}

/// An error rendered to the client as `{"error", "code", "message"}`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{name} ({code}): {message}")]
pub struct ApiError {
    name: &'static str,
    code: u32,
    status: StatusCode,
    message: ErrorMessage,
    headers: HeaderMap,
}

impl ApiError {
    fn from_def(def: &ErrDef, message: ErrorMessage) -> Self {
        Self {
            name: def.name,
            code: def.code,
            status: def.status,
            message,
            headers: HeaderMap::new(),
        }
    }

    /// Generic error with a custom message.
    pub fn new(message: impl Into<ErrorMessage>) -> Self {
        API_ERROR.with_message(message)
    }

    /// Validation failure carrying a field → messages map.
    pub fn validation(fields: FieldErrors) -> Self {
        VALIDATION_ERROR.with_message(fields)
    }

    /// Query conversion failure.
    pub fn query_parse(message: impl Into<String>) -> Self {
        QUERY_PARSE_ERROR.with_message(message.into())
    }

    /// Override the HTTP status of this occurrence.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a response header sent along with the envelope.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &ErrorMessage {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True when this error was raised from the given catalog entry.
    pub fn is(&self, def: &ErrDef) -> bool {
        self.code == def.code && self.name == def.name
    }

    /// JSON envelope body for this error.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.name,
            "code": self.code,
            "message": self.message,
        })
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, serde_json::Value) {
        let body = self.envelope();
        (self.status, self.headers, body)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        collect_validation_errors(&errors, "", &mut fields);
        ApiError::validation(fields)
    }
}

/// Flatten nested validator errors into dotted/indexed field paths.
fn collect_validation_errors(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut FieldErrors,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                messages.extend(list.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect_validation_errors(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

/// Failure returned by a handler.
///
/// Only [`HandlerError::Api`] is turned into an error envelope; `Internal`
/// propagates out of the normalizer untouched.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Wrap any error as an internal (non-envelope) failure.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        HandlerError::Internal(err.into())
    }
}

impl From<ErrDef> for HandlerError {
    fn from(def: ErrDef) -> Self {
        HandlerError::Api(def.error())
    }
}
