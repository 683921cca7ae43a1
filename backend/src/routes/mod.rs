use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

pub mod admin;
pub mod lottery;

pub async fn health_check() -> impl IntoResponse {
    "OK"
}

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(vec![header::CONTENT_TYPE]);

    match allowed_origin.and_then(|origin| origin.parse::<HeaderValue>().ok()) {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    }
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/admin", admin::create_router())
        .merge(lottery::create_router());

    let mut app = Router::new()
        .route("/api/health_check", get(health_check))
        .nest("/api/lottery", api)
        .layer(cors_layer(state.config.allowed_origin.as_deref()));

    if let Some(dir) = state.config.static_dir.as_ref() {
        tracing::info!("Serving widget assets from {}", dir.display());
        let assets = tower::ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache"),
            ))
            .service(ServeDir::new(dir));
        app = app.fallback_service(assets);
    }

    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use lottery_shared::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;

    fn state_with_delay(spin_delay: Duration) -> AppState {
        let config = Config {
            spin_delay,
            ..Config::default()
        };
        AppState::new(config, Arc::new(MemoryStore::new())).unwrap()
    }

    fn test_state() -> AppState {
        state_with_delay(Duration::ZERO)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "10.0.0.1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => json_request(method, uri, json),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .header("x-forwarded-for", "10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        };

        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
        call(state, Method::POST, uri, Some(body)).await
    }

    async fn fetch(state: &AppState, uri: &str) -> (StatusCode, Value) {
        call(state, Method::GET, uri, None).await
    }

    #[tokio::test]
    async fn test_redeem_flow() {
        let state = test_state();

        let (status, issued) =
            post(&state, "/api/lottery/admin/codes", json!({ "code": "win0001" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(issued["codes"][0], "WIN0001");

        let (_, verified) = post(&state, "/api/lottery/verify", json!({ "code": "WIN0001" })).await;
        assert_eq!(verified["ok"], true);
        assert_eq!(verified["remaining_draws"], 3);
        let session_id = verified["session_id"].as_str().unwrap().to_string();

        let (status, spun) =
            post(&state, "/api/lottery/spin", json!({ "session_id": session_id })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(spun["success"], true);
        assert_eq!(spun["remaining_draws"], 2);
        assert!(spun["prize"]["name"].is_string());
        assert!(spun["rotation_degrees"].as_f64().unwrap() > 1800.0);

        let (_, again) = post(&state, "/api/lottery/verify", json!({ "code": "WIN0001" })).await;
        assert_eq!(again["ok"], false);
        assert_eq!(again["kind"], "already_consumed");

        let (_, codes) = fetch(&state, "/api/lottery/admin/codes").await;
        assert_eq!(codes["codes"][0]["consumed"], true);

        let (_, records) = fetch(&state, "/api/lottery/admin/records").await;
        assert_eq!(records["records"][0]["identity"], "10.0.0.1");
        assert_eq!(records["records"][0]["count"], 1);

        let (_, stats) = fetch(&state, "/api/lottery/stats").await;
        assert_eq!(stats["total_draws"], 1);
        assert_eq!(stats["today_draws"], 1);
    }

    #[tokio::test]
    async fn test_verify_unknown_code() {
        let state = test_state();
        let (status, body) = post(&state, "/api/lottery/verify", json!({ "code": "NOPE" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_spin_unknown_session() {
        let state = test_state();
        let unknown = json!({ "session_id": uuid::Uuid::new_v4().to_string() });
        let (status, body) = post(&state, "/api/lottery/spin", unknown).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "invalid_session_state");
    }

    #[tokio::test]
    async fn test_admin_bulk_duplicate_and_delete() {
        let state = test_state();

        let (status, bulk) =
            post(&state, "/api/lottery/admin/codes/bulk", json!({ "count": 5 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bulk["codes"].as_array().unwrap().len(), 5);

        let (status, _) =
            post(&state, "/api/lottery/admin/codes/bulk", json!({ "count": 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, random) = post(&state, "/api/lottery/admin/codes", json!({})).await;
        assert_eq!(random["codes"][0].as_str().unwrap().len(), 8);

        post(&state, "/api/lottery/admin/codes", json!({ "code": "DUP" })).await;
        let (status, body) =
            post(&state, "/api/lottery/admin/codes", json!({ "code": "dup" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "already_exists");

        let (status, _) = call(&state, Method::DELETE, "/api/lottery/admin/codes/DUP", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, codes) = fetch(&state, "/api/lottery/admin/codes").await;
        assert_eq!(codes["codes"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_abandoned_session_cannot_spin() {
        let state = test_state();
        post(&state, "/api/lottery/admin/codes", json!({ "code": "LATER" })).await;
        let (_, verified) = post(&state, "/api/lottery/verify", json!({ "code": "LATER" })).await;
        let session_id = verified["session_id"].as_str().unwrap().to_string();

        let (status, _) =
            post(&state, "/api/lottery/abandon", json!({ "session_id": session_id })).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            post(&state, "/api/lottery/spin", json!({ "session_id": session_id })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let lottery = state.lottery.lock();
        assert!(!lottery.is_consumed("LATER"));
    }

    #[tokio::test]
    async fn test_dropped_spin_request_commits_nothing() {
        let state = state_with_delay(Duration::from_secs(60));
        post(&state, "/api/lottery/admin/codes", json!({ "code": "GONE" })).await;
        let (_, verified) = post(&state, "/api/lottery/verify", json!({ "code": "GONE" })).await;
        let session_id = verified["session_id"].as_str().unwrap().to_string();

        let spin = app(state.clone()).oneshot(json_request(
            Method::POST,
            "/api/lottery/spin",
            json!({ "session_id": session_id }),
        ));
        let cut_short = tokio::time::timeout(Duration::from_millis(50), spin).await;
        assert!(cut_short.is_err());

        assert_eq!(state.sessions.len(), 0);
        {
            let lottery = state.lottery.lock();
            assert!(!lottery.is_consumed("GONE"));
            assert_eq!(lottery.rate_status("10.0.0.1").current_attempts, 0);
        }

        let (status, _) =
            post(&state, "/api/lottery/spin", json!({ "session_id": session_id })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, retry) = post(&state, "/api/lottery/verify", json!({ "code": "GONE" })).await;
        assert_eq!(retry["ok"], true);
    }
}
