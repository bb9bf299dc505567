//! # apikit - JSON API helpers for axum
//!
//! Building blocks for JSON endpoints that share one response contract.
//!
//! ## Features
//!
//! - **Normalized replies**: handlers return a [`Reply`]; errors become a
//!   `{"error", "code", "message"}` envelope
//! - **CORS**: preflight and actual-request headers from one [`CorsPolicy`]
//! - **Pagination**: page/limit parsing with clamping and `X-Pagination-*` headers
//! - **Request context**: body, typed query binding and validation in [`ApiRequest`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use apikit::{ApiKit, ApiRequest, ApiView, HandlerError, Reply};
//!
//! async fn list(req: ApiRequest) -> Result<Reply, HandlerError> {
//!     let page = req.pagination();
//!     let (items, total) = repo.fetch(page.skip(), page.limit()).await?;
//!     Ok(Reply::page(serde_json::to_value(items).map_err(HandlerError::internal)?, page.with_total(total)))
//! }
//!
//! let kit = ApiKit::from_provider(&provider)?;
//! let app = ApiView::new().get(list).allow_options().route("/items", &kit);
//! ```

pub mod config;
pub mod cors;
pub mod error;
pub mod headers;
pub mod pagination;
pub mod query;
pub mod response;
pub mod trace;
pub mod view;

pub use config::{ApiKit, ApiKitConfig, ConfigError};
pub use cors::{AllowOrigin, CorsConfig, CorsPolicy};
pub use error::{
    ApiError, ErrDef, ErrorMessage, FieldErrors, HandlerError, API_ERROR, QUERY_PARSE_ERROR,
    VALIDATION_ERROR,
};
pub use pagination::{HeaderKeys, Pagination, PaginationConfig};
pub use query::{parse_bool, parse_float, parse_int, QueryParams, QueryParser, QuerySchema};
pub use response::{normalize, ApiResponse, Body, NormalizedResponse, Reply};
pub use view::{ApiRequest, ApiView};
