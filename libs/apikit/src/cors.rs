//! CORS policy: header computation for preflight and actual requests.
//!
//! Requests without an `Origin` header are treated as same-origin and get no
//! CORS headers at all. Every header is written only when the response does
//! not already carry it, except `Access-Control-Expose-Headers`, which is
//! appended to.

use crate::config::ConfigError;
use crate::headers::{append_list, join_upper, set_if_absent};
use crate::response::{Body, NormalizedResponse};
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ALLOW,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which origins may read responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowOrigin {
    /// `"*"`
    #[default]
    Any,
    /// A single origin string.
    Exact(String),
    /// A list of origin strings.
    List(Vec<String>),
    /// `null`: never emit `Access-Control-Allow-Origin`.
    Disabled,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOrigin {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for AllowOrigin {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawOrigin>::deserialize(d)? {
            None => AllowOrigin::Disabled,
            Some(RawOrigin::One(origin)) if origin.trim() == "*" => AllowOrigin::Any,
            Some(RawOrigin::One(origin)) => AllowOrigin::Exact(origin),
            Some(RawOrigin::Many(list)) => AllowOrigin::List(list),
        })
    }
}

impl Serialize for AllowOrigin {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            AllowOrigin::Any => s.serialize_str("*"),
            AllowOrigin::Exact(origin) => s.serialize_str(origin),
            AllowOrigin::List(list) => list.serialize(s),
            AllowOrigin::Disabled => s.serialize_none(),
        }
    }
}

fn default_allow_headers() -> Option<Vec<String>> {
    Some(vec!["Authorization".into(), "Content-Type".into()])
}

fn default_max_age() -> Option<u64> {
    Some(600)
}

/// CORS settings as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origin: AllowOrigin,
    #[serde(default)]
    pub allow_credentials: bool,
    /// `null` or empty omits `Access-Control-Allow-Headers`.
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Option<Vec<String>>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// Seconds; `null` omits `Access-Control-Max-Age`.
    #[serde(default = "default_max_age")]
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: AllowOrigin::Any,
            allow_credentials: false,
            allow_headers: default_allow_headers(),
            expose_headers: Vec::new(),
            max_age: default_max_age(),
        }
    }
}

#[derive(Debug, Clone)]
enum OriginRule {
    Any,
    Exact(HeaderValue),
    List(Vec<String>),
    Never,
}

/// Validated CORS policy with pre-rendered header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: OriginRule,
    credentials: bool,
    allow_headers: Option<HeaderValue>,
    expose_headers: Vec<String>,
    max_age: Option<HeaderValue>,
}

fn check_header_names(field: &'static str, names: &[String]) -> Result<(), ConfigError> {
    for name in names {
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::Cors {
            field,
            value: name.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

impl CorsPolicy {
    pub fn new(cfg: &CorsConfig) -> Result<Self, ConfigError> {
        let origin = match &cfg.allow_origin {
            AllowOrigin::Any => OriginRule::Any,
            AllowOrigin::Disabled => OriginRule::Never,
            AllowOrigin::Exact(origin) if origin.trim() == "*" => OriginRule::Any,
            AllowOrigin::Exact(origin) => {
                let value = HeaderValue::from_str(origin.trim()).map_err(|e| ConfigError::Cors {
                    field: "allow_origin",
                    value: origin.clone(),
                    reason: e.to_string(),
                })?;
                OriginRule::Exact(value)
            }
            AllowOrigin::List(list) if list.iter().any(|o| o.trim() == "*") => OriginRule::Any,
            AllowOrigin::List(list) => {
                OriginRule::List(list.iter().map(|o| o.trim().to_string()).collect())
            }
        };

        let allow_headers = match cfg.allow_headers.as_deref() {
            None | Some([]) => None,
            Some(names) => {
                check_header_names("allow_headers", names)?;
                HeaderValue::from_str(&join_upper(names)).ok()
            }
        };

        check_header_names("expose_headers", &cfg.expose_headers)?;
        let expose_headers = cfg
            .expose_headers
            .iter()
            .map(|h| h.to_ascii_uppercase())
            .collect();

        Ok(Self {
            origin,
            credentials: cfg.allow_credentials,
            allow_headers,
            expose_headers,
            max_age: cfg.max_age.map(HeaderValue::from),
        })
    }

    /// Value for `Access-Control-Allow-Origin`, if this origin is allowed.
    pub fn allow_origin_value(&self, origin: &HeaderValue) -> Option<HeaderValue> {
        let allowed = match &self.origin {
            OriginRule::Any if self.credentials => Some(origin.clone()),
            OriginRule::Any => Some(HeaderValue::from_static("*")),
            OriginRule::Exact(value) => origin
                .as_bytes()
                .eq_ignore_ascii_case(value.as_bytes())
                .then(|| value.clone()),
            OriginRule::List(list) => list
                .iter()
                .any(|o| o.as_bytes().eq_ignore_ascii_case(origin.as_bytes()))
                .then(|| origin.clone()),
            OriginRule::Never => None,
        };
        if allowed.is_none() {
            tracing::debug!(origin = ?origin, "origin not allowed by CORS policy");
        }
        allowed
    }

    fn apply_common(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        if self.credentials {
            set_if_absent(
                headers,
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(value) = self.allow_origin_value(origin) {
            set_if_absent(headers, ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }

    /// Answer an OPTIONS request without running any handler.
    ///
    /// `methods` is the full method set of the route; it is also sent as
    /// `Allow`.
    pub fn preflight(&self, origin: Option<&HeaderValue>, methods: &[Method]) -> NormalizedResponse {
        let mut resp = NormalizedResponse::new(StatusCode::OK, Body::Empty);
        let allowed = methods_value(methods);
        if let Some(value) = &allowed {
            resp.headers_mut().insert(ALLOW, value.clone());
        }

        let Some(origin) = origin else {
            return resp;
        };
        let headers = resp.headers_mut();

        if let Some(value) = allowed {
            set_if_absent(headers, ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if let Some(value) = &self.allow_headers {
            set_if_absent(headers, ACCESS_CONTROL_ALLOW_HEADERS, value.clone());
        }
        if let Some(value) = &self.max_age {
            set_if_absent(headers, ACCESS_CONTROL_MAX_AGE, value.clone());
        }
        self.apply_common(origin, headers);
        resp
    }

    /// Add CORS headers to a handler's normalized response.
    ///
    /// Expose-Headers order: the handler's own value, then the configured
    /// headers, then pagination names still pending on the response.
    /// Without an `Origin` the pending names are dropped and nothing is added.
    pub fn decorate(
        &self,
        origin: Option<&HeaderValue>,
        mut resp: NormalizedResponse,
    ) -> NormalizedResponse {
        let Some(origin) = origin else {
            resp.take_pending_expose();
            return resp;
        };

        let mut expose = self.expose_headers.clone();
        expose.extend(resp.take_pending_expose());
        let headers = resp.headers_mut();
        append_list(headers, ACCESS_CONTROL_EXPOSE_HEADERS, &expose);
        self.apply_common(origin, headers);
        resp
    }
}

/// Sorted, de-duplicated, upper-cased method list.
pub(crate) fn methods_value(methods: &[Method]) -> Option<HeaderValue> {
    let mut names: Vec<String> = methods
        .iter()
        .map(|m| m.as_str().to_ascii_uppercase())
        .collect();
    names.sort();
    names.dedup();
    if names.is_empty() {
        return None;
    }
    HeaderValue::from_str(&names.join(", ")).ok()
}
