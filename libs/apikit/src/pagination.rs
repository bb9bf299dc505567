//! Page/limit handling for list endpoints.

use crate::query::QueryParams;
use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

fn default_limit() -> NonZeroU64 {
    NonZeroU64::new(10).unwrap_or(NonZeroU64::MIN)
}

fn default_page_key() -> String {
    "page".to_string()
}

fn default_limit_key() -> String {
    "limit".to_string()
}

fn default_true() -> bool {
    true
}

/// Pagination settings, shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationConfig {
    /// Limit used when the query has none (or a non-positive one).
    #[serde(default = "default_limit")]
    pub default_limit: NonZeroU64,
    /// Upper bound for `limit`; `0` disables clamping.
    #[serde(default)]
    pub max_limit: u64,
    #[serde(default = "default_page_key")]
    pub page_query_key: String,
    #[serde(default = "default_limit_key")]
    pub limit_query_key: String,
    #[serde(default)]
    pub header_keys: HeaderKeys,
    /// Add the pagination header names to `Access-Control-Expose-Headers`.
    #[serde(default = "default_true")]
    pub auto_expose_headers: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: 0,
            page_query_key: default_page_key(),
            limit_query_key: default_limit_key(),
            header_keys: HeaderKeys::default(),
            auto_expose_headers: true,
        }
    }
}

/// Response header names used for pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct HeaderKeys {
    #[serde(with = "header_name")]
    pub page: HeaderName,
    #[serde(with = "header_name")]
    pub limit: HeaderName,
    #[serde(with = "header_name")]
    pub count: HeaderName,
    #[serde(with = "header_name")]
    pub page_count: HeaderName,
}

impl Default for HeaderKeys {
    fn default() -> Self {
        Self {
            page: HeaderName::from_static("x-pagination-page"),
            limit: HeaderName::from_static("x-pagination-limit"),
            count: HeaderName::from_static("x-pagination-count"),
            page_count: HeaderName::from_static("x-pagination-page-count"),
        }
    }
}

impl HeaderKeys {
    fn all(&self) -> [&HeaderName; 4] {
        [&self.page, &self.limit, &self.count, &self.page_count]
    }
}

/// Header names are checked while the config is deserialized.
mod header_name {
    use http::HeaderName;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(name: &HeaderName, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(name.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<HeaderName, D::Error> {
        let raw = String::deserialize(d)?;
        HeaderName::from_bytes(raw.trim().as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid header name `{raw}`: {e}")))
    }
}

/// Lenient integer read used for page/limit: anything unparsable is `None`.
/// Positive values past `u64::MAX` saturate.
fn lenient_int(raw: Option<&str>) -> Option<i128> {
    raw.and_then(|v| v.trim().parse::<i128>().ok())
}

fn saturate(v: i128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// Per-request pagination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    limit: NonZeroU64,
    skip: u64,
    count: Option<u64>,
    page_count: Option<u64>,
}

impl Pagination {
    /// Build from already-validated values; a zero page is treated as page 1.
    ///
    /// The page is capped at `u64::MAX / limit + 1`, the last page whose
    /// offset is still representable.
    pub fn new(page: u64, limit: NonZeroU64) -> Self {
        let last = (u64::MAX / limit.get()).saturating_add(1);
        let page = page.clamp(1, last);
        Self {
            page,
            limit,
            skip: (page - 1) * limit.get(),
            count: None,
            page_count: None,
        }
    }

    /// Derive page/limit/skip from raw query values.
    ///
    /// Missing, unparsable or non-positive values fall back to page 1 and
    /// `default_limit`; the limit is then clamped to `max_limit` when set.
    pub fn compute(raw_page: Option<&str>, raw_limit: Option<&str>, cfg: &PaginationConfig) -> Self {
        let page = lenient_int(raw_page)
            .filter(|p| *p >= 1)
            .map_or(1, saturate);

        let mut limit = lenient_int(raw_limit)
            .filter(|l| *l >= 1)
            .and_then(|l| NonZeroU64::new(saturate(l)))
            .unwrap_or(cfg.default_limit);

        if let Some(max) = NonZeroU64::new(cfg.max_limit) {
            limit = limit.min(max);
        }

        Self::new(page, limit)
    }

    pub fn from_query(params: &QueryParams, cfg: &PaginationConfig) -> Self {
        Self::compute(
            params.get(&cfg.page_query_key),
            params.get(&cfg.limit_query_key),
            cfg,
        )
    }

    /// Record the total number of items and derive the page count.
    pub fn attach_total(&mut self, count: u64) {
        self.count = Some(count);
        self.page_count = Some(count.div_ceil(self.limit.get()));
    }

    pub fn with_total(mut self, count: u64) -> Self {
        self.attach_total(count);
        self
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit.get()
    }

    /// Number of items to skip before this page.
    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn page_count(&self) -> Option<u64> {
        self.page_count
    }

    /// Metadata headers as decimal strings; count headers only once the total is known.
    pub fn headers(&self, cfg: &PaginationConfig) -> Vec<(HeaderName, HeaderValue)> {
        let keys = &cfg.header_keys;
        let mut out = vec![
            (keys.page.clone(), HeaderValue::from(self.page)),
            (keys.limit.clone(), HeaderValue::from(self.limit.get())),
        ];
        if let Some(count) = self.count {
            out.push((keys.count.clone(), HeaderValue::from(count)));
        }
        if let Some(page_count) = self.page_count {
            out.push((keys.page_count.clone(), HeaderValue::from(page_count)));
        }
        out
    }

    /// Upper-cased header names for `Access-Control-Expose-Headers`.
    pub fn expose_tokens(cfg: &PaginationConfig) -> Vec<String> {
        cfg.header_keys
            .all()
            .iter()
            .map(|name| name.as_str().to_ascii_uppercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(default_limit: u64, max_limit: u64) -> PaginationConfig {
        PaginationConfig {
            default_limit: NonZeroU64::new(default_limit).unwrap(),
            max_limit,
            ..PaginationConfig::default()
        }
    }

    #[test]
    fn defaults_apply_without_query() {
        let p = Pagination::compute(None, None, &PaginationConfig::default());
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 10);
        assert_eq!(p.skip(), 0);
        assert_eq!(p.count(), None);
        assert_eq!(p.page_count(), None);
    }

    #[test]
    fn page_below_one_is_clamped() {
        let c = cfg(10, 0);
        for raw in ["0", "-1", "-100"] {
            assert_eq!(Pagination::compute(Some(raw), None, &c).page(), 1, "page={raw}");
        }
    }

    #[test]
    fn limit_below_one_resets_to_default() {
        let c = cfg(25, 0);
        for raw in ["0", "-5"] {
            assert_eq!(Pagination::compute(None, Some(raw), &c).limit(), 25, "limit={raw}");
        }
    }

    #[test]
    fn limit_above_max_is_clamped() {
        let c = cfg(10, 50);
        assert_eq!(Pagination::compute(None, Some("51"), &c).limit(), 50);
        assert_eq!(Pagination::compute(None, Some("50"), &c).limit(), 50);
        assert_eq!(Pagination::compute(None, Some("7"), &c).limit(), 7);

        let unbounded = cfg(10, 0);
        assert_eq!(
            Pagination::compute(None, Some("100000"), &unbounded).limit(),
            100_000
        );
    }

    #[test]
    fn unparsable_values_default_silently() {
        let c = cfg(10, 0);
        let p = Pagination::compute(Some("abc"), Some("1.5"), &c);
        assert_eq!((p.page(), p.limit()), (1, 10));
    }

    #[test]
    fn skip_is_page_offset() {
        let c = cfg(10, 0);
        for (page, limit) in [(1u64, 1u64), (2, 10), (3, 7), (10, 100)] {
            let (raw_page, raw_limit) = (page.to_string(), limit.to_string());
            let p = Pagination::compute(Some(raw_page.as_str()), Some(raw_limit.as_str()), &c);
            assert_eq!(p.skip(), (page - 1) * limit);
        }
    }

    #[test]
    fn huge_page_keeps_skip_exact() {
        let c = cfg(10, 0);
        for raw in ["9223372036854775807", "18446744073709551615"] {
            let p = Pagination::compute(Some(raw), Some("10"), &c);
            assert_eq!(p.page(), u64::MAX / 10 + 1, "page={raw}");
            assert_eq!(Some(p.skip()), (p.page() - 1).checked_mul(p.limit()));
        }

        let p = Pagination::new(u64::MAX, NonZeroU64::MIN);
        assert_eq!((p.page(), p.skip()), (u64::MAX, u64::MAX - 1));
    }

    #[test]
    fn page_count_rounds_up() {
        let c = cfg(10, 0);
        let mut p = Pagination::compute(None, None, &c);
        p.attach_total(101);
        assert_eq!(p.count(), Some(101));
        assert_eq!(p.page_count(), Some(11));

        assert_eq!(p.with_total(100).page_count(), Some(10));
        assert_eq!(p.with_total(0).page_count(), Some(0));
    }

    #[test]
    fn from_query_honours_configured_keys() {
        let c = PaginationConfig {
            page_query_key: "p".into(),
            limit_query_key: "size".into(),
            ..PaginationConfig::default()
        };
        let params = QueryParams::parse("p=3&size=20&page=9");
        let p = Pagination::from_query(&params, &c);
        assert_eq!((p.page(), p.limit(), p.skip()), (3, 20, 40));
    }

    #[test]
    fn headers_follow_known_totals() {
        let c = PaginationConfig::default();
        let p = Pagination::compute(Some("2"), Some("5"), &c);
        let names: Vec<_> = p.headers(&c).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x-pagination-page", "x-pagination-limit"]);

        let headers = p.with_total(12).headers(&c);
        let rendered: Vec<_> = headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.to_str().unwrap()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("x-pagination-page", "2"),
                ("x-pagination-limit", "5"),
                ("x-pagination-count", "12"),
                ("x-pagination-page-count", "3"),
            ]
        );
    }

    #[test]
    fn expose_tokens_are_upper_cased() {
        assert_eq!(
            Pagination::expose_tokens(&PaginationConfig::default()),
            vec![
                "X-PAGINATION-PAGE",
                "X-PAGINATION-LIMIT",
                "X-PAGINATION-COUNT",
                "X-PAGINATION-PAGE-COUNT",
            ]
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let c: PaginationConfig = serde_json::from_value(json!({
            "max_limit": 100,
            "header_keys": {"count": "X-Total"}
        }))
        .unwrap();
        assert_eq!(c.default_limit.get(), 10);
        assert_eq!(c.max_limit, 100);
        assert_eq!(c.header_keys.count, "x-total");
        assert_eq!(c.header_keys.page, "x-pagination-page");
        assert!(c.auto_expose_headers);
    }

    #[test]
    fn config_rejects_zero_default_limit_and_bad_header_names() {
        assert!(serde_json::from_value::<PaginationConfig>(json!({"default_limit": 0})).is_err());
        assert!(serde_json::from_value::<PaginationConfig>(
            json!({"header_keys": {"page": "not a header"}})
        )
        .is_err());
    }
}
