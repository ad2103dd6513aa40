use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use std::net::SocketAddr;
use tower::ServiceExt;
use user_api::{
    config::Config,
    server::{create_app, routes, with_pipeline},
    state::{AppState, SharedState},
};

const API_KEY: &str = "test-key";

fn test_state(permits: u32) -> SharedState {
    let config = Config {
        api_keys: API_KEY.to_string(),
        rate_limit_permits: permits,
        ..Config::default()
    };
    AppState::shared(&config)
}

fn request(method: Method, uri: &str, key: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-Api-Key", key);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo("10.1.2.3:40000".parse::<SocketAddr>().unwrap()));
    request
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_user_lifecycle_scenario() {
    let state = test_state(100);
    let app = create_app(state.clone());

    let response = send(
        &app,
        request(Method::POST, "/api/user/create", Some(API_KEY), Some(serde_json::json!({"name": "Test User"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::LOCATION], "/api/user/1");
    assert_eq!(body_json(response).await, serde_json::json!({"id": 1, "name": "Test User"}));

    let response = send(
        &app,
        request(Method::POST, "/api/user/create", Some(API_KEY), Some(serde_json::json!({"name": "Test User 2"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["id"], 2);

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!([{"id": 1, "name": "Test User"}, {"id": 2, "name": "Test User 2"}])
    );

    let response = send(&app, request(Method::DELETE, "/api/user/1", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, request(Method::GET, "/api/user/1", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(body_json(response).await, serde_json::json!([{"id": 2, "name": "Test User 2"}]));
}

#[tokio::test]
async fn test_update_outcomes() {
    let app = create_app(test_state(100));
    send(
        &app,
        request(Method::POST, "/api/user/create", Some(API_KEY), Some(serde_json::json!({"name": "Before"}))),
    )
    .await;

    let response = send(
        &app,
        request(Method::PUT, "/api/user/1", Some(API_KEY), Some(serde_json::json!({"name": "After"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, request(Method::GET, "/api/user/1", Some(API_KEY), None)).await;
    assert_eq!(body_json(response).await, serde_json::json!({"id": 1, "name": "After"}));

    let response = send(
        &app,
        request(Method::PUT, "/api/user/999", Some(API_KEY), Some(serde_json::json!({"name": ""}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        request(Method::PUT, "/api/user/999", Some(API_KEY), Some(serde_json::json!({"name": "Ghost"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_create_payloads() {
    let app = create_app(test_state(100));

    for payload in [
        Some(serde_json::json!({})),
        Some(serde_json::json!({"name": ""})),
        Some(serde_json::json!({"name": null})),
        None,
    ] {
        let response = send(&app, request(Method::POST, "/api/user/create", Some(API_KEY), payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid user data.");
    }

    let response = send(&app, request(Method::GET, "/api/user/abc", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_key_is_rejected_before_other_stages() {
    let state = test_state(100);
    let app = create_app(state.clone());

    let response = send(&app, request(Method::GET, "/api/user", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "Unauthorized: API token was not provided.");

    let response = send(&app, request(Method::GET, "/api/user", Some("wrong"), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "Unauthorized: Invalid API token.");

    assert_eq!(state.rate_limiter.tracked_clients(), 0);
    assert_eq!(state.tracker.count_for("/api/user"), 0);
}

#[tokio::test]
async fn test_rate_limited_requests_are_not_counted() {
    let state = test_state(3);
    let app = create_app(state.clone());

    for _ in 0..3 {
        let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    assert_eq!(state.tracker.count_for("/api/user"), 3);
}

#[tokio::test]
async fn test_rate_limit_headers_count_down() {
    let app = create_app(test_state(3));

    for expected in ["2", "1", "0"] {
        let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected);
    }

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-limit"], "3");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = Config {
        api_keys: API_KEY.to_string(),
        max_body_bytes: 16,
        ..Config::default()
    };
    let state = AppState::shared(&config);
    let app = create_app(state.clone());

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/user/create",
            Some(API_KEY),
            Some(serde_json::json!({"name": "x".repeat(100)})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.store.len(), Ok(0));
    assert!(state.tracker.get_counts().is_empty());
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let state = test_state(1);
    let app = create_app(state.clone());

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut other = request(Method::GET, "/api/user", Some(API_KEY), None);
    other
        .extensions_mut()
        .insert(ConnectInfo("10.9.9.9:40000".parse::<SocketAddr>().unwrap()));
    let response = send(&app, other).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.rate_limiter.tracked_clients(), 2);
}

#[tokio::test]
async fn test_call_counts_endpoint() {
    let app = create_app(test_state(100));

    send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    send(&app, request(Method::GET, "/api/user/7", Some(API_KEY), None)).await;
    send(&app, request(Method::GET, "/api/user", None, None)).await;

    let response = send(&app, request(Method::GET, "/api/user/apicallcounts", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "/api/user": 2,
            "/api/user/7": 1,
            "/api/user/apicallcounts": 1
        })
    );
}

#[tokio::test]
async fn test_bypass_prefix_skips_auth_and_tracking() {
    let state = test_state(100);
    let app = create_app(state.clone());

    let response = send(&app, request(Method::GET, "/swagger", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["auth_header"], "X-Api-Key");

    let response = send(&app, request(Method::GET, "/swagger/index.html", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(state.rate_limiter.tracked_clients(), 0);
    assert!(state.tracker.get_counts().is_empty());
}

async fn explode() -> &'static str {
    panic!("store invariant violated")
}

#[tokio::test]
async fn test_panic_is_contained() {
    let state = test_state(100);
    let terminal = routes(state.clone()).route("/api/explode", get(explode));
    let app = with_pipeline(terminal, state.clone());

    let response = send(&app, request(Method::GET, "/api/explode", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, serde_json::json!({"error": "Internal server error."}));
    assert_eq!(state.tracker.count_for("/api/explode"), 1);

    let response = send(&app, request(Method::GET, "/api/user", Some(API_KEY), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_creates_get_unique_ids() {
    let app = create_app(test_state(1000));

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let response = app
                    .oneshot(request(
                        Method::POST,
                        "/api/user/create",
                        Some(API_KEY),
                        Some(serde_json::json!({"name": format!("user-{i}")})),
                    ))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::CREATED);
                body_json(response).await["id"].as_u64().unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    assert!(ids.iter().all(|id| *id > 0));
}
