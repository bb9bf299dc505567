//! Base view: per-request context and per-route method dispatch.
//!
//! Every request served by an [`ApiView`] goes through the same pipeline:
//!
//! 1. `OPTIONS` is answered by the CORS policy (no handler runs), or with
//!    405 when the route did not enable it;
//! 2. otherwise the matching handler runs and its result is normalized;
//! 3. the CORS policy decorates the normalized response.
//!
//! Handler failures that are not [`ApiError`]s end the pipeline with an
//! empty 500 and an error log.

use crate::config::ApiKit;
use crate::error::{ApiError, HandlerError};
use crate::pagination::{Pagination, PaginationConfig};
use crate::query::{QueryParams, QuerySchema};
use crate::response::{normalize, Reply};
use crate::trace::create_trace_layer;
use axum::body::Bytes;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures::future::{BoxFuture, FutureExt};
use http::header::{ALLOW, ORIGIN};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use validator::Validate;

/// Largest request body read into an [`ApiRequest`].
pub const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Request context handed to handlers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: QueryParams,
    body: Bytes,
    pagination_cfg: Arc<PaginationConfig>,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        pagination_cfg: Arc<PaginationConfig>,
    ) -> Self {
        let query = QueryParams::from_uri(&uri);
        Self {
            method,
            uri,
            headers,
            query,
            body,
            pagination_cfg,
        }
    }

    /// Buffer the body of an incoming request.
    pub async fn from_request(
        req: Request,
        pagination_cfg: Arc<PaginationConfig>,
    ) -> Result<Self, ApiError> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|e| ApiError::new(format!("request body could not be read: {e}")))?;
        Ok(Self::new(
            parts.method,
            parts.uri,
            parts.headers,
            body,
            pagination_cfg,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn origin(&self) -> Option<&HeaderValue> {
        self.headers.get(ORIGIN)
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query
    }

    /// Bind the query string through `schema`.
    pub fn query(&self, schema: &QuerySchema) -> Result<Map<String, Value>, ApiError> {
        schema.bind(&self.query)
    }

    /// Page/limit/skip for this request.
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(&self.query, &self.pagination_cfg)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn body_or_empty_object(&self) -> &[u8] {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &self.body
        }
    }

    /// Body as JSON; an empty body reads as `{}`.
    pub fn json_value(&self) -> Result<Value, ApiError> {
        self.json()
    }

    /// Deserialize the body. Malformed input is a `ValidationError` under `_schema`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(self.body_or_empty_object()).map_err(|e| {
            ApiError::validation(BTreeMap::from([("_schema".to_string(), vec![e.to_string()])]))
        })
    }

    /// Deserialize the body and run its `validator` rules.
    pub fn validated_json<T: DeserializeOwned + Validate>(&self) -> Result<T, ApiError> {
        let value: T = self.json()?;
        value.validate()?;
        Ok(value)
    }
}

type BoxHandler =
    Arc<dyn Fn(ApiRequest) -> BoxFuture<'static, Result<Reply, HandlerError>> + Send + Sync>;

/// Method table for a single route.
///
/// ```no_run
/// use apikit::{ApiKit, ApiKitConfig, ApiRequest, ApiView, HandlerError, Reply};
///
/// async fn list_users(req: ApiRequest) -> Result<Reply, HandlerError> {
///     let page = req.pagination().with_total(0);
///     Ok(Reply::page(serde_json::json!([]), page))
/// }
///
/// let kit = ApiKit::from_config(ApiKitConfig::default()).unwrap();
/// let router: axum::Router = ApiView::new()
///     .get(list_users)
///     .allow_options()
///     .route("/users", &kit);
/// ```
#[derive(Clone, Default)]
pub struct ApiView {
    handlers: HashMap<Method, BoxHandler>,
    options: bool,
}

impl ApiView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`.
    ///
    /// `OPTIONS` is always answered by the CORS policy, so registering it
    /// only enables preflight for the route; the handler is never called.
    pub fn on<H, Fut, R, E>(mut self, method: Method, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        if method == Method::OPTIONS {
            self.options = true;
            return self;
        }
        let boxed: BoxHandler = Arc::new(move |req: ApiRequest| {
            handler(req)
                .map(|res| -> Result<Reply, HandlerError> {
                    res.map(Into::into).map_err(Into::into)
                })
                .boxed()
        });
        self.handlers.insert(method, boxed);
        self
    }

    pub fn get<H, Fut, R, E>(self, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        self.on(Method::GET, handler)
    }

    pub fn post<H, Fut, R, E>(self, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        self.on(Method::POST, handler)
    }

    pub fn put<H, Fut, R, E>(self, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        self.on(Method::PUT, handler)
    }

    pub fn patch<H, Fut, R, E>(self, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        self.on(Method::PATCH, handler)
    }

    pub fn delete<H, Fut, R, E>(self, handler: H) -> Self
    where
        H: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Into<Reply> + 'static,
        E: Into<HandlerError> + 'static,
    {
        self.on(Method::DELETE, handler)
    }

    /// Answer `OPTIONS` with a CORS preflight response.
    pub fn allow_options(mut self) -> Self {
        self.options = true;
        self
    }

    /// Methods served by this route: registered ones, `HEAD` when `GET` is
    /// registered, and `OPTIONS` when enabled. Sorted by name.
    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().cloned().collect();
        if self.handlers.contains_key(&Method::GET) && !self.handlers.contains_key(&Method::HEAD) {
            methods.push(Method::HEAD);
        }
        if self.options {
            methods.push(Method::OPTIONS);
        }
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    fn handler_for(&self, method: &Method) -> Option<&BoxHandler> {
        self.handlers.get(method).or_else(|| {
            if *method == Method::HEAD {
                self.handlers.get(&Method::GET)
            } else {
                None
            }
        })
    }

    /// Serve one request: preflight or handler, normalization, then CORS.
    pub async fn dispatch(&self, kit: &ApiKit, req: Request) -> Response {
        let origin = req.headers().get(ORIGIN).cloned();
        let method = req.method().clone();

        if method == Method::OPTIONS {
            if self.options {
                return kit
                    .cors()
                    .preflight(origin.as_ref(), &self.methods())
                    .into_response();
            }
            return self.method_not_allowed();
        }

        let Some(handler) = self.handler_for(&method) else {
            return self.method_not_allowed();
        };

        let result = match ApiRequest::from_request(req, kit.pagination().clone()).await {
            Ok(api_req) => handler(api_req).await,
            Err(e) => Err(e.into()),
        };

        match normalize(result, kit.pagination()) {
            Ok(resp) => kit.cors().decorate(origin.as_ref(), resp).into_response(),
            Err(err) => {
                tracing::error!(method = %method, error = ?err, "unhandled handler error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    fn method_not_allowed(&self) -> Response {
        let mut resp = StatusCode::METHOD_NOT_ALLOWED.into_response();
        if let Some(allow) = crate::cors::methods_value(&self.methods()) {
            resp.headers_mut().insert(ALLOW, allow);
        }
        resp
    }

    /// Mount this view at `path` in a new router with request tracing.
    pub fn route(self, path: &str, kit: &ApiKit) -> Router {
        let view = Arc::new(self);
        let kit = kit.clone();
        Router::new()
            .route(
                path,
                any(move |req: Request| {
                    let view = view.clone();
                    let kit = kit.clone();
                    async move { view.dispatch(&kit, req).await }
                }),
            )
            .layer(create_trace_layer())
    }
}

impl std::fmt::Debug for ApiView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiView")
            .field("methods", &self.methods())
            .finish()
    }
}
