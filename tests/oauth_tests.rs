use axum::{
    Form, Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, Response, StatusCode, header},
    routing::{get, post},
};
use http_body_util::BodyExt;
use quill::config::Config;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

#[derive(Default)]
struct ProviderHits {
    token: AtomicUsize,
    resource: AtomicUsize,
}

async fn token_endpoint(
    State(hits): State<Arc<ProviderHits>>,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    hits.token.fetch_add(1, Ordering::SeqCst);

    let well_formed = params.get("grant_type").map(String::as_str) == Some("authorization_code")
        && params.get("client_id").map(String::as_str) == Some("quill-client")
        && params.get("client_secret").map(String::as_str) == Some("s3cret")
        && params.get("redirect_uri").map(String::as_str) == Some("http://localhost:5000/callback");

    match params.get("code").map(String::as_str) {
        Some("good-code") if well_formed => (
            StatusCode::OK,
            Json(json!({
                "access_token": "tok-123",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-456",
            })),
        ),
        Some("short-lived") => (
            StatusCode::OK,
            Json(json!({
                "access_token": "tok-123",
                "token_type": "bearer",
                "expires_in": 1,
            })),
        ),
        Some("no-token") => (StatusCode::OK, Json(json!({ "token_type": "bearer" }))),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        ),
    }
}

async fn resource_endpoint(
    State(hits): State<Arc<ProviderHits>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    hits.resource.fetch_add(1, Ordering::SeqCst);

    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer tok-123") => (StatusCode::OK, Json(json!({ "user": "alice", "id": 7 }))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_token" })),
        ),
    }
}

/// Fake authorization server on an ephemeral port.
async fn spawn_provider() -> (String, Arc<ProviderHits>) {
    let hits = Arc::new(ProviderHits::default());
    let app = Router::new()
        .route("/oauth/token", post(token_endpoint))
        .route("/api/resource", get(resource_endpoint))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

async fn spawn_app(provider: &str) -> Router {
    let mut config = Config::default();
    config.general.database_url = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;
    config.oauth.client_secret = "s3cret".to_string();
    config.oauth.authorize_url = format!("{provider}/oauth/authorize");
    config.oauth.token_url = format!("{provider}/oauth/token");
    config.oauth.resource_url = format!("{provider}/api/resource");
    config.oauth.request_timeout_seconds = 5;

    let state = quill::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    quill::api::router(state).expect("Failed to build router")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("quill_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Starts a flow and returns the session cookie plus the issued `state`.
async fn begin_flow(app: &Router) -> (String, String) {
    let response = app.clone().oneshot(get_request("/auth", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = session_cookie(&response).expect("/auth should start a session");
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let url = url::Url::parse(location).unwrap();

    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(url.path(), "/oauth/authorize");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "quill-client");
    assert_eq!(params["scope"], "read");

    (cookie, params["state"].clone())
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let (provider, hits) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;
    assert_eq!(state.len(), 64);

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/callback?code=good-code&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/token");

    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["access_token"], "tok-123");
    assert_eq!(payload["refresh_token"], "refresh-456");
    assert_eq!(hits.token.load(Ordering::SeqCst), 1);

    let response = app
        .clone()
        .oneshot(get_request("/protected_resource", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "user": "alice", "id": 7 }));
    assert_eq!(hits.resource.load(Ordering::SeqCst), 1);

    // The code was consumed by the first exchange.
    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hits.token.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_without_code_makes_no_upstream_call() {
    let (provider, hits) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let response = app.clone().oneshot(get_request("/token", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].is_string());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A started but unfinished flow has no code either.
    let (cookie, _) = begin_flow(&app).await;
    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(hits.token.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_protected_resource_without_token() {
    let (provider, hits) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let response = app
        .clone()
        .oneshot(get_request("/protected_resource", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
    assert_eq!(hits.resource.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_dropped() {
    let (provider, hits) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;
    app.clone()
        .oneshot(get_request(
            &format!("/callback?code=short-lived&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app
        .clone()
        .oneshot(get_request("/protected_resource", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());

    let response = app
        .clone()
        .oneshot(get_request("/protected_resource", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(hits.resource.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_callback_state_is_checked_and_single_use() {
    let (provider, _) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;

    let response = app
        .clone()
        .oneshot(get_request(
            "/callback?code=good-code&state=forged",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The mismatch consumed the pending state.
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/callback?code=good-code&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A callback with no flow at all.
    let response = app
        .clone()
        .oneshot(get_request("/callback?code=good-code&state=x", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_reports_denied_authorization() {
    let (provider, _) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/callback?error=access_denied&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_upstream_rejection_is_bad_gateway() {
    let (provider, hits) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;
    app.clone()
        .oneshot(get_request(
            &format!("/callback?code=bad-code&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["upstream_status"], 400);
    assert_eq!(body["upstream_body"]["error"], "invalid_grant");
    assert_eq!(hits.token.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_response_without_access_token() {
    let (provider, _) = spawn_provider().await;
    let app = spawn_app(&provider).await;

    let (cookie, state) = begin_flow(&app).await;
    app.clone()
        .oneshot(get_request(
            &format!("/callback?code=no-token&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = app
        .clone()
        .oneshot(get_request("/protected_resource", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_provider_is_bad_gateway() {
    // Bind then drop a listener so the port is closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let app = spawn_app(&dead).await;
    let (cookie, state) = begin_flow(&app).await;
    app.clone()
        .oneshot(get_request(
            &format!("/callback?code=good-code&state={state}"),
            Some(&cookie),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/token", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(response).await["error"].is_string());
}
