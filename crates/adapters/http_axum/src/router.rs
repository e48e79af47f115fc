//! Axum router assembly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use smarthub_app::ports::{BusTransport, DeviceRepository, UsageStore};

use crate::metrics::{self, track_requests};
use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests API routes under `/api` next to the probes and the Prometheus
/// scrape endpoint. Every routed request is counted and timed by
/// [`track_requests`]. Includes a [`TraceLayer`] that logs each HTTP
/// request/response at the `DEBUG` level using the `tracing` ecosystem, and a
/// permissive CORS layer for browser dashboards served from another origin.
pub fn build<DR, US, BT>(state: AppState<DR, US, BT>) -> Router
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let request_metrics = Arc::clone(&state.metrics);
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check::<DR, US, BT>))
        .route("/metrics", get(metrics::report::<DR, US, BT>))
        .nest("/api", crate::api::routes())
        .route_layer(middleware::from_fn_with_state(
            request_metrics,
            track_requests,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Possible responses from the readiness probe.
enum ReadyResponse {
    Ready,
    NotReady(&'static str),
}

impl IntoResponse for ReadyResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ready => Json(json!({"status": "ready"})).into_response(),
            Self::NotReady(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not ready", "reason": reason})),
            )
                .into_response(),
        }
    }
}

/// Ready when the device store answers and the bus is connected.
async fn ready_check<DR, US, BT>(State(state): State<AppState<DR, US, BT>>) -> ReadyResponse
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    if let Err(err) = state.devices.list_ids().await {
        tracing::warn!(error = %err, "device store not ready");
        return ReadyResponse::NotReady("device store unavailable");
    }
    if !state.sync.is_connected() {
        tracing::debug!("bus not connected");
        return ReadyResponse::NotReady("bus disconnected");
    }
    ReadyResponse::Ready
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::test_state;

    fn light(id: &str) -> Value {
        json!({
            "id": id,
            "type": "light",
            "room": "Living Room",
            "name": "Ceiling",
            "status": "off",
            "parameters": {"brightness": 50, "color": "#FFFFFF", "is_dimmable": true, "dynamic_color": false}
        })
    }

    fn request(method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let (state, _) = test_state(true);

        let response = build(state)
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_expose_request_and_device_metrics() {
        let (state, _) = test_state(true);
        let app = build(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Method::GET, "/health", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(request(Method::GET, "/metrics", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            prometheus::TEXT_FORMAT
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(r#"request_count{endpoint="/health",method="GET"} 2"#));
        assert!(text.contains(r#"request_latency_seconds_count{endpoint="/health"} 2"#));
        assert!(text.contains(r#"device_status{device_id="light-1",device_type="light"} 1"#));
        assert!(text.contains(
            r#"device_on_events_total{device_id="light-1",device_type="light"} 3"#
        ));
    }

    #[tokio::test]
    async fn should_not_be_ready_while_bus_disconnected() {
        let (state, _) = test_state(false);

        let response = build(state)
            .oneshot(request(Method::GET, "/ready", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["reason"], "bus disconnected");
    }

    #[tokio::test]
    async fn should_be_ready_when_dependencies_answer() {
        let (state, _) = test_state(true);

        let response = build(state)
            .oneshot(request(Method::GET, "/ready", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_create_device_and_publish_post() {
        let (state, bus) = test_state(true);

        let response = build(state)
            .oneshot(request(Method::POST, "/api/devices", Some(&light("l1"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, light("l1"));
        assert_eq!(bus.topics(), vec!["home/devices/l1/post"]);
    }

    #[tokio::test]
    async fn should_reject_invalid_device_with_violations() {
        let (state, bus) = test_state(true);
        let mut document = light("l1");
        document["parameters"]["brightness"] = json!(150);

        let response = build(state)
            .oneshot(request(Method::POST, "/api/devices", Some(&document)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": ["'brightness' must be between 0 and 100, got 150 instead."]})
        );
        assert!(bus.topics().is_empty());
    }

    #[tokio::test]
    async fn should_answer_conflict_for_duplicate_id() {
        let (state, _) = test_state(true);
        let app = build(state);
        app.clone()
            .oneshot(request(Method::POST, "/api/devices", Some(&light("l1"))))
            .await
            .unwrap();

        let response = app
            .oneshot(request(Method::POST, "/api/devices", Some(&light("l1"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn should_update_device_and_publish_request_body() {
        let (state, bus) = test_state(true);
        let app = build(state);
        app.clone()
            .oneshot(request(Method::POST, "/api/devices", Some(&light("l1"))))
            .await
            .unwrap();
        let change = json!({"status": "on", "parameters": {"brightness": 70}});

        let response = app
            .oneshot(request(Method::PUT, "/api/devices/l1", Some(&change)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "on");
        assert_eq!(body["parameters"]["brightness"], 70);
        assert_eq!(body["parameters"]["color"], "#FFFFFF");
        let sent = bus.sent.lock().unwrap();
        assert_eq!(sent[1].topic, "home/devices/l1/update");
        let payload: Value = serde_json::from_slice(&sent[1].payload).unwrap();
        assert_eq!(payload, json!({"contents": change}));
    }

    #[tokio::test]
    async fn should_reject_update_with_other_id() {
        let (state, _) = test_state(true);

        let response = build(state)
            .oneshot(request(
                Method::PUT,
                "/api/devices/l1",
                Some(&json!({"id": "l2"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_return_not_found_for_missing_device() {
        let (state, _) = test_state(true);
        let app = build(state);

        for method in [Method::GET, Method::DELETE] {
            let response = app
                .clone()
                .oneshot(request(method, "/api/devices/ghost", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn should_delete_device_and_publish_empty_contents() {
        let (state, bus) = test_state(true);
        let app = build(state);
        app.clone()
            .oneshot(request(Method::POST, "/api/devices", Some(&light("l1"))))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/devices/l1", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let sent = bus.sent.lock().unwrap();
        assert_eq!(sent[1].topic, "home/devices/l1/delete");
        assert_eq!(sent[1].payload, br#"{"contents":{}}"#);
    }

    #[tokio::test]
    async fn should_list_ids() {
        let (state, _) = test_state(true);
        let app = build(state);
        for id in ["b", "a"] {
            app.clone()
                .oneshot(request(Method::POST, "/api/devices", Some(&light(id))))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(request(Method::GET, "/api/ids", None))
            .await
            .unwrap();

        assert_eq!(body_json(response).await, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn should_reject_inverted_analytics_window() {
        let (state, _) = test_state(true);

        let response = build(state)
            .oneshot(request(
                Method::GET,
                "/api/devices/analytics?from=2024-05-02T00:00:00Z&to=2024-05-01T00:00:00Z",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_route_analytics_before_device_id() {
        let (state, _) = test_state(true);

        let response = build(state)
            .oneshot(request(Method::GET, "/api/devices/analytics", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totals"]["on_events"], 0);
    }
}
