//! Handler return values and their normalization into HTTP responses.
//!
//! A handler returns `Result<Reply, HandlerError>`. [`normalize`] turns that
//! into a [`NormalizedResponse`]: API errors become the JSON envelope, plain
//! values get their default status, and paginated responses receive their
//! metadata headers. Internal errors are handed back to the caller.

use crate::error::HandlerError;
use crate::headers::{append_list, set_if_absent};
use crate::pagination::{Pagination, PaginationConfig};
use axum::response::{IntoResponse, Response};
use http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Response body before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Text(String),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Text(text.to_string())
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(value: Option<T>) -> Self {
        value.map_or(Body::Empty, Into::into)
    }
}

/// What a handler hands back on success.
#[derive(Debug, Clone)]
pub enum Reply {
    /// No content: 204 with an empty body.
    Empty,
    /// Bare mapping or sequence: 200 with a JSON body.
    Json(Value),
    /// Plain text: 200.
    Text(String),
    /// Body with an explicit status and/or extra headers (status defaults to 200).
    Parts {
        body: Body,
        status: Option<StatusCode>,
        headers: HeaderMap,
    },
    /// Full response descriptor, optionally paginated.
    Response(ApiResponse),
}

impl Reply {
    /// Serialize `value` as a JSON reply; failures are internal errors.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        serde_json::to_value(value)
            .map(Reply::Json)
            .map_err(HandlerError::internal)
    }

    /// A list page carrying its pagination metadata.
    pub fn page(data: impl Into<Value>, pagination: Pagination) -> Self {
        Reply::Response(ApiResponse::new(data).paginated(pagination))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reply::Empty, Into::into)
    }
}

impl From<ApiResponse> for Reply {
    fn from(response: ApiResponse) -> Self {
        Reply::Response(response)
    }
}

impl From<(Value, StatusCode)> for Reply {
    fn from((body, status): (Value, StatusCode)) -> Self {
        Reply::Parts {
            body: body.into(),
            status: Some(status),
            headers: HeaderMap::new(),
        }
    }
}

impl From<(Value, HeaderMap)> for Reply {
    fn from((body, headers): (Value, HeaderMap)) -> Self {
        Reply::Parts {
            body: body.into(),
            status: None,
            headers,
        }
    }
}

impl From<(Value, StatusCode, HeaderMap)> for Reply {
    fn from((body, status, headers): (Value, StatusCode, HeaderMap)) -> Self {
        Reply::Parts {
            body: body.into(),
            status: Some(status),
            headers,
        }
    }
}

/// Explicit response descriptor. `data` is always rendered as JSON.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    data: Value,
    status: StatusCode,
    headers: HeaderMap,
    pagination: Option<Pagination>,
    auto_expose: Option<bool>,
}

impl ApiResponse {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            pagination: None,
            auto_expose: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Attach pagination metadata; headers are emitted during normalization.
    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Override `auto_expose_headers` for this response.
    pub fn auto_expose(mut self, enabled: bool) -> Self {
        self.auto_expose = Some(enabled);
        self
    }
}

/// Canonical (status, headers, body) produced for every non-preflight request.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    /// Pagination expose tokens not yet merged into `Access-Control-Expose-Headers`.
    pending_expose: Vec<String>,
}

impl NormalizedResponse {
    pub fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            pending_expose: Vec::new(),
        }
    }

    fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn pending_expose(&self) -> &[String] {
        &self.pending_expose
    }

    pub(crate) fn take_pending_expose(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_expose)
    }
}

impl IntoResponse for NormalizedResponse {
    fn into_response(mut self) -> Response {
        let pending = self.take_pending_expose();
        append_list(&mut self.headers, ACCESS_CONTROL_EXPOSE_HEADERS, &pending);

        let (content_type, bytes) = match self.body {
            Body::Empty => (None, Vec::new()),
            Body::Text(text) => (Some("text/plain; charset=utf-8"), text.into_bytes()),
            Body::Json(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => (Some("application/json"), bytes),
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode JSON body");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            },
        };
        if let Some(ct) = content_type {
            set_if_absent(&mut self.headers, CONTENT_TYPE, HeaderValue::from_static(ct));
        }

        let mut response = Response::new(axum::body::Body::from(bytes));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Shape a handler result.
///
/// `HandlerError::Internal` is returned as `Err` untouched.
pub fn normalize(
    result: Result<Reply, HandlerError>,
    cfg: &PaginationConfig,
) -> Result<NormalizedResponse, anyhow::Error> {
    match result {
        Ok(reply) => Ok(shape(reply, cfg)),
        Err(HandlerError::Api(err)) => {
            tracing::warn!(
                error = err.name(),
                code = err.code(),
                status = err.status().as_u16(),
                "request failed: {}",
                err.message()
            );
            let (status, headers, body) = err.into_parts();
            Ok(NormalizedResponse::new(status, Body::Json(body)).with_headers(headers))
        }
        Err(HandlerError::Internal(err)) => Err(err),
    }
}

fn shape(reply: Reply, cfg: &PaginationConfig) -> NormalizedResponse {
    match reply {
        Reply::Empty => NormalizedResponse::new(StatusCode::NO_CONTENT, Body::Empty),
        Reply::Json(value) => NormalizedResponse::new(StatusCode::OK, Body::Json(value)),
        Reply::Text(text) => NormalizedResponse::new(StatusCode::OK, Body::Text(text)),
        Reply::Parts {
            body,
            status,
            headers,
        } => NormalizedResponse::new(status.unwrap_or(StatusCode::OK), body).with_headers(headers),
        Reply::Response(resp) => {
            let mut out =
                NormalizedResponse::new(resp.status, Body::Json(resp.data)).with_headers(resp.headers);
            if let Some(pagination) = resp.pagination {
                for (name, value) in pagination.headers(cfg) {
                    set_if_absent(&mut out.headers, name, value);
                }
                if resp.auto_expose.unwrap_or(cfg.auto_expose_headers) {
                    out.pending_expose = Pagination::expose_tokens(cfg);
                }
            }
            out
        }
    }
}
