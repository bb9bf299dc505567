//! Query string access and typed conversion.

use crate::error::ApiError;
use http::Uri;
use serde_json::{Map, Number, Value};
use std::fmt::Display;

/// Parse a base-10 integer query value.
pub fn parse_int(value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::query_parse(format!("value \"{value}\" can not parse to int")))
}

/// Parse a floating point query value.
pub fn parse_float(value: &str) -> Result<f64, ApiError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ApiError::query_parse(format!("value \"{value}\" can not parse to float")))
}

/// `true` only for `"true"` (any case) and `"1"`; everything else is `false`.
pub fn parse_bool(value: impl Display) -> bool {
    let value = value.to_string();
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Ordered query-parameter multi-map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` query string (without `?`).
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn from_uri(uri: &Uri) -> Self {
        uri.query().map(Self::parse).unwrap_or_default()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in request order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Distinct keys in order of first appearance.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.0 {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Conversion applied to a raw query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryParser {
    Str,
    Int,
    Float,
    Bool,
}

impl QueryParser {
    pub fn parse(self, raw: &str) -> Result<Value, ApiError> {
        match self {
            QueryParser::Str => Ok(Value::String(raw.to_string())),
            QueryParser::Int => parse_int(raw).map(Value::from),
            QueryParser::Float => parse_float(raw).and_then(|f| {
                Number::from_f64(f).map(Value::Number).ok_or_else(|| {
                    ApiError::query_parse(format!("value \"{raw}\" can not parse to float"))
                })
            }),
            QueryParser::Bool => Ok(Value::Bool(parse_bool(raw))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldShape {
    Scalar(QueryParser),
    List(QueryParser),
}

/// Declares how query keys are converted when binding a request's query.
///
/// ```
/// use apikit::query::{QueryParams, QueryParser, QuerySchema};
///
/// let schema = QuerySchema::new()
///     .field("age", QueryParser::Int)
///     .list("tags", QueryParser::Str);
/// let bound = schema.bind(&QueryParams::parse("age=7&tags=a&tags=b&q=x")).unwrap();
/// assert_eq!(bound["age"], 7);
/// assert_eq!(bound["tags"], serde_json::json!(["a", "b"]));
/// assert_eq!(bound["q"], "x");
/// ```
#[derive(Debug, Clone, Default)]
pub struct QuerySchema {
    fields: Vec<(String, FieldShape)>,
}

impl QuerySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-valued key; the first occurrence is converted.
    pub fn field(mut self, key: impl Into<String>, parser: QueryParser) -> Self {
        self.fields.push((key.into(), FieldShape::Scalar(parser)));
        self
    }

    /// Multi-valued key; every occurrence is converted, in order.
    pub fn list(mut self, key: impl Into<String>, parser: QueryParser) -> Self {
        self.fields.push((key.into(), FieldShape::List(parser)));
        self
    }

    fn shape_of(&self, key: &str) -> Option<FieldShape> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, shape)| *shape)
    }

    /// Bind `params` into a JSON object.
    ///
    /// Keys missing from the query are omitted and keys without a declared
    /// shape pass through as their first value.
    pub fn bind(&self, params: &QueryParams) -> Result<Map<String, Value>, ApiError> {
        let mut out = Map::new();
        for key in params.keys() {
            let value = match self.shape_of(key) {
                Some(FieldShape::Scalar(parser)) => match params.get(key) {
                    Some(raw) => parser.parse(raw)?,
                    None => continue,
                },
                Some(FieldShape::List(parser)) => Value::Array(
                    params
                        .get_all(key)
                        .map(|raw| parser.parse(raw))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                None => match params.get(key) {
                    Some(raw) => Value::String(raw.to_string()),
                    None => continue,
                },
            };
            out.insert(key.to_string(), value);
        }
        Ok(out)
    }
}
