use apikit::{ApiKit, ApiKitConfig, ApiRequest, ApiResponse, ApiView, HandlerError, Reply};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

const EXAMPLE: &str = "https://example.com";

fn kit(cfg: Value) -> ApiKit {
    let cfg: ApiKitConfig = serde_json::from_value(cfg).unwrap();
    ApiKit::from_config(cfg).unwrap()
}

async fn empty_object(_req: ApiRequest) -> Result<Value, HandlerError> {
    Ok(json!({}))
}

/// GET + PATCH + OPTIONS, like a typical resource route.
fn app(kit: &ApiKit) -> Router {
    ApiView::new()
        .get(empty_object)
        .patch(empty_object)
        .allow_options()
        .route("/", kit)
}

async fn send(app: Router, method: Method, origin: Option<&str>) -> (StatusCode, HeaderMap) {
    let mut req = Request::builder().method(method).uri("/");
    if let Some(origin) = origin {
        req = req.header("origin", origin);
    }
    let response = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    (response.status(), response.headers().clone())
}

fn split_sorted(value: &HeaderValue) -> Vec<String> {
    let mut items: Vec<String> = value
        .to_str()
        .unwrap()
        .split(", ")
        .map(str::to_string)
        .collect();
    items.sort();
    items
}

#[tokio::test]
async fn default_configs() {
    let kit = kit(json!({}));

    let (status, headers) = send(app(&kit), Method::OPTIONS, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-max-age"], "600");
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        split_sorted(&headers["access-control-allow-methods"]),
        vec!["GET", "HEAD", "OPTIONS", "PATCH"]
    );
    assert_eq!(
        headers["access-control-allow-headers"],
        "AUTHORIZATION, CONTENT-TYPE"
    );
    assert!(!headers.contains_key("access-control-expose-headers"));
    assert!(!headers.contains_key("access-control-allow-credentials"));

    let (status, headers) = send(app(&kit), Method::GET, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
    for absent in [
        "access-control-max-age",
        "access-control-allow-methods",
        "access-control-allow-headers",
        "access-control-expose-headers",
        "access-control-allow-credentials",
    ] {
        assert!(!headers.contains_key(absent), "{absent} should be absent on GET");
    }

    let (status, headers) = send(app(&kit), Method::GET, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .keys()
        .all(|name| !name.as_str().starts_with("access-control-")));
}

#[tokio::test]
async fn options_without_registration_is_rejected() {
    let kit = kit(json!({}));
    let app = ApiView::new().get(empty_object).route("/", &kit);

    let (status, headers) = send(app.clone(), Method::OPTIONS, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers["allow"], "GET, HEAD");

    let (status, _) = send(app, Method::GET, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn allowed_methods_follow_registration() {
    let kit = kit(json!({}));
    let custom_a = Method::from_bytes(b"A").unwrap();
    let custom_b = Method::from_bytes(b"B").unwrap();
    let app = ApiView::new()
        .get(empty_object)
        .on(custom_a, empty_object)
        .on(custom_b, empty_object)
        .on(Method::OPTIONS, empty_object)
        .route("/", &kit);

    let (status, headers) = send(app.clone(), Method::OPTIONS, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        split_sorted(&headers["access-control-allow-methods"]),
        vec!["A", "B", "GET", "HEAD", "OPTIONS"]
    );

    let (_, headers) = send(app, Method::GET, Some(EXAMPLE)).await;
    assert!(!headers.contains_key("access-control-allow-methods"));
}

#[tokio::test]
async fn max_age_none_and_custom() {
    let (_, headers) = send(
        app(&kit(json!({"cors": {"max_age": null}}))),
        Method::OPTIONS,
        Some(EXAMPLE),
    )
    .await;
    assert!(!headers.contains_key("access-control-max-age"));

    let kit = kit(json!({"cors": {"max_age": 1}}));
    let (_, headers) = send(app(&kit), Method::OPTIONS, Some(EXAMPLE)).await;
    assert_eq!(headers["access-control-max-age"], "1");
    let (_, headers) = send(app(&kit), Method::GET, Some(EXAMPLE)).await;
    assert!(!headers.contains_key("access-control-max-age"));
}

#[tokio::test]
async fn allow_origin_wildcard() {
    let kit = kit(json!({"cors": {"allow_origin": "*"}}));

    let (_, headers) = send(app(&kit), Method::GET, None).await;
    assert!(!headers.contains_key("access-control-allow-origin"));
    assert!(!headers.contains_key("access-control-allow-credentials"));

    for method in [Method::OPTIONS, Method::GET] {
        let (status, headers) = send(app(&kit), method, Some(EXAMPLE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(!headers.contains_key("access-control-allow-credentials"));
    }
}

#[tokio::test]
async fn allow_origin_wildcard_with_credentials() {
    let kit = kit(json!({"cors": {"allow_origin": "*", "allow_credentials": true}}));

    let (_, headers) = send(app(&kit), Method::GET, None).await;
    assert!(!headers.contains_key("access-control-allow-origin"));
    assert!(!headers.contains_key("access-control-allow-credentials"));

    for method in [Method::OPTIONS, Method::GET] {
        let (_, headers) = send(app(&kit), method, Some(EXAMPLE)).await;
        assert_eq!(headers["access-control-allow-origin"], EXAMPLE);
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }
}

#[tokio::test]
async fn allow_origin_null_never_emits() {
    let kit = kit(json!({"cors": {"allow_origin": null}}));
    for method in [Method::OPTIONS, Method::GET] {
        let (status, headers) = send(app(&kit), method, Some(EXAMPLE)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("access-control-allow-origin"));
    }
}

#[tokio::test]
async fn allow_origin_single_string() {
    let kit = kit(json!({"cors": {"allow_origin": EXAMPLE}}));

    let (_, headers) = send(app(&kit), Method::GET, None).await;
    assert!(!headers.contains_key("access-control-allow-origin"));

    for method in [Method::OPTIONS, Method::GET] {
        let (_, headers) = send(app(&kit), method.clone(), Some(EXAMPLE)).await;
        assert_eq!(headers["access-control-allow-origin"], EXAMPLE);

        let (status, headers) = send(app(&kit), method, Some("https://1.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("access-control-allow-origin"));
    }
}

#[tokio::test]
async fn allow_origin_list() {
    let kit = kit(json!({"cors": {"allow_origin": [
        "https://1.example.com",
        "http://1.example.com",
        "https://2.example.com"
    ]}}));

    let (_, headers) = send(app(&kit), Method::GET, None).await;
    assert!(!headers.contains_key("access-control-allow-origin"));

    for method in [Method::OPTIONS, Method::GET] {
        for origin in ["https://1.example.com", "http://1.example.com"] {
            let (_, headers) = send(app(&kit), method.clone(), Some(origin)).await;
            assert_eq!(headers["access-control-allow-origin"], origin);
        }
        let (status, headers) =
            send(app(&kit), method.clone(), Some("https://3.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("access-control-allow-origin"));
    }
}

#[tokio::test]
async fn allow_headers_none_and_custom() {
    let (_, headers) = send(
        app(&kit(json!({"cors": {"allow_headers": null}}))),
        Method::OPTIONS,
        Some(EXAMPLE),
    )
    .await;
    assert!(!headers.contains_key("access-control-allow-headers"));

    let kit = kit(json!({"cors": {"allow_headers": ["X-Aa", "X-Ab"]}}));
    let (_, headers) = send(app(&kit), Method::OPTIONS, Some(EXAMPLE)).await;
    assert_eq!(headers["access-control-allow-headers"], "X-AA, X-AB");
    let (_, headers) = send(app(&kit), Method::GET, Some(EXAMPLE)).await;
    assert!(!headers.contains_key("access-control-allow-headers"));
}

fn paginated_app(kit: &ApiKit, auto_expose: Option<bool>) -> Router {
    ApiView::new()
        .get(move |req: ApiRequest| async move {
            let page = req.pagination().with_total(4);
            let mut resp = ApiResponse::new(json!([1, 2])).paginated(page);
            if let Some(flag) = auto_expose {
                resp = resp.auto_expose(flag);
            }
            Ok::<_, HandlerError>(resp)
        })
        .route("/", kit)
}

#[tokio::test]
async fn pagination_expose_headers_use_configured_names() {
    let kit = kit(json!({"pagination": {"header_keys": {
        "page": "X-Page",
        "limit": "X-Limit",
        "count": "X-Count",
        "page_count": "X-Page-Count"
    }}}));

    let (status, headers) = send(paginated_app(&kit, None), Method::GET, Some(EXAMPLE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["access-control-expose-headers"],
        "X-PAGE, X-LIMIT, X-COUNT, X-PAGE-COUNT"
    );
    assert_eq!(headers["x-count"], "4");
    assert_eq!(headers["x-limit"], "10");
    assert_eq!(headers["x-page"], "1");
    assert_eq!(headers["x-page-count"], "1");
}

#[tokio::test]
async fn expose_headers_merge_config_before_pagination() {
    let kit_empty = kit(json!({"cors": {"expose_headers": []}}));
    let (_, headers) = send(paginated_app(&kit_empty, None), Method::GET, Some(EXAMPLE)).await;
    assert_eq!(
        headers["access-control-expose-headers"],
        "X-PAGINATION-PAGE, X-PAGINATION-LIMIT, X-PAGINATION-COUNT, X-PAGINATION-PAGE-COUNT"
    );

    let kit_custom = kit(json!({"cors": {"expose_headers": ["X-Ea", "X-Eb"]}}));
    let (_, headers) = send(paginated_app(&kit_custom, None), Method::GET, Some(EXAMPLE)).await;
    assert_eq!(
        headers["access-control-expose-headers"],
        "X-EA, X-EB, X-PAGINATION-PAGE, X-PAGINATION-LIMIT, X-PAGINATION-COUNT, X-PAGINATION-PAGE-COUNT"
    );
}

#[tokio::test]
async fn expose_headers_without_auto_pagination() {
    let kit_empty = kit(json!({"cors": {"expose_headers": []}}));
    let (_, headers) =
        send(paginated_app(&kit_empty, Some(false)), Method::GET, Some(EXAMPLE)).await;
    assert!(!headers.contains_key("access-control-expose-headers"));

    let kit_custom = kit(json!({"cors": {"expose_headers": ["X-Ea", "X-Eb"]}}));
    let (_, headers) =
        send(paginated_app(&kit_custom, Some(false)), Method::GET, Some(EXAMPLE)).await;
    assert_eq!(headers["access-control-expose-headers"], "X-EA, X-EB");
}

#[tokio::test]
async fn no_origin_gets_pagination_headers_but_no_expose_list() {
    let kit = kit(json!({"cors": {"expose_headers": ["X-Ea"]}}));
    let (_, headers) = send(paginated_app(&kit, None), Method::GET, None).await;
    assert_eq!(headers["x-pagination-page"], "1");
    assert_eq!(headers["x-pagination-count"], "4");
    assert!(!headers.contains_key("access-control-expose-headers"));
    assert!(!headers.contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn handler_expose_header_is_kept_first() {
    let kit = kit(json!({"cors": {"expose_headers": ["X-Test-1", "X-Test-2"]}}));
    let app = ApiView::new()
        .get(|_req: ApiRequest| async {
            let mut headers = HeaderMap::new();
            headers.insert(
                "access-control-expose-headers",
                HeaderValue::from_static("X-From-Handler"),
            );
            Ok::<_, HandlerError>(Reply::from((json!({}), headers)))
        })
        .route("/", &kit);

    let (_, headers) = send(app, Method::GET, Some(EXAMPLE)).await;
    assert_eq!(
        headers["access-control-expose-headers"],
        "X-From-Handler, X-TEST-1, X-TEST-2"
    );
}
