//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `body_limit` - Maximum accepted request body in bytes
pub(crate) fn create_router(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/generate", post(handlers::generate::generate))
        .route("/generate-bulk", post(handlers::bulk::generate_bulk))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer())
                .layer(security::no_store_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use pretty_assertions::assert_eq;
    use qrs_config::Transport;
    use qrs_render::{
        ContextManager, EngineError, QrRenderer, RenderOptions, RenderingBridge, StylingEngine,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn state() -> Arc<AppState> {
        state_with(QrRenderer::default(), Transport::Json)
    }

    fn state_with(renderer: QrRenderer, transport: Transport) -> Arc<AppState> {
        Arc::new(AppState {
            renderer,
            transport,
            version: "0.1.0".to_owned(),
        })
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
        create_router(Arc::clone(state), 1024 * 1024)
            .oneshot(request)
            .await
            .unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn decode_data_uri(uri: &str, mime: &str) -> Vec<u8> {
        let payload = uri
            .strip_prefix(&format!("data:{mime};base64,"))
            .unwrap();
        STANDARD.decode(payload).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let response = send(
            &state(),
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"QR microservice running");
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(
            &state(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_security_headers() {
        let response = send(
            &state(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn test_generate_svg() {
        let state = state();
        let response = send(
            &state,
            post_json(
                "/generate",
                &json!({"data": "https://example.com", "size": 300, "format": "svg"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["mime_type"], "image/svg+xml");
        assert_eq!(body["format"], "svg");
        assert_eq!(body["size"], 300);
        let svg = decode_data_uri(body["qr_code"].as_str().unwrap(), "image/svg+xml");
        assert!(svg.starts_with(b"<svg"));
        assert_eq!(state.renderer.contexts().live_contexts(), 0);
    }

    #[tokio::test]
    async fn test_generate_png_has_configured_size() {
        let response = send(
            &state(),
            post_json(
                "/generate",
                &json!({"data": "hello", "format": "png", "color": "#ff0000"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["mime_type"], "image/png");
        let png = decode_data_uri(body["qr_code"].as_str().unwrap(), "image/png");
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (300, 300));
    }

    #[tokio::test]
    async fn test_invalid_ecl_falls_back() {
        let response = send(
            &state(),
            post_json(
                "/generate",
                &json!({"data": "hello", "errorCorrectionLevel": "Z"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_missing_data_acquires_nothing() {
        let state = state();
        for body in [json!({"size": 300}), json!({"data": ""}), json!({})] {
            let response = send(&state, post_json("/generate", &body)).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await, json!({"error": "data is required"}));
        }
        assert_eq!(state.renderer.contexts().launched_total(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&state(), request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_non_object_body() {
        let response = send(&state(), post_json("/generate", &json!([1, 2]))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_binary_transport() {
        let response = send(
            &state(),
            post_json("/generate?transport=binary", &json!({"data": "raw"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"<svg"));
    }

    #[tokio::test]
    async fn test_configured_binary_transport_can_be_overridden() {
        let state = state_with(QrRenderer::default(), Transport::Binary);

        let response = send(
            &state,
            post_json("/generate", &json!({"data": "x", "format": "pdf"})),
        )
        .await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

        let response = send(
            &state,
            post_json("/generate?transport=json", &json!({"data": "x"})),
        )
        .await;
        assert_eq!(json_body(response).await["success"], true);
    }

    struct Stalled;

    impl StylingEngine for Stalled {
        fn paint(&self, _: &RenderOptions) -> Result<String, EngineError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_render_timeout_is_internal_error() {
        let renderer = QrRenderer::new(
            ContextManager::default(),
            RenderingBridge::new(Arc::new(Stalled)).with_timeout(Duration::from_millis(20)),
        );
        let state = state_with(renderer, Transport::Json);

        let response = send(&state, post_json("/generate", &json!({"data": "x"}))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "render timed out");
        assert!(body["details"].as_str().unwrap().contains("20ms"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(state.renderer.contexts().live_contexts(), 0);
    }

    #[tokio::test]
    async fn test_bulk() {
        let state = state();
        let response = send(
            &state,
            post_json(
                "/generate-bulk",
                &json!({"items": [{"data": "a"}, {"data": "b", "name": "bee"}], "size": 200}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["total"], 2);
        assert_eq!(body["succeeded"], 2);
        let codes = body["qr_codes"].as_array().unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0]["data"], "a");
        assert_eq!(codes[0]["name"], "qr-1");
        assert_eq!(codes[1]["name"], "bee");
        assert!(codes.iter().all(|c| c["qr_code"].as_str().is_some_and(|s| !s.is_empty())));
        assert_eq!(state.renderer.contexts().launched_total(), 1);
        assert_eq!(state.renderer.contexts().live_contexts(), 0);
    }

    #[tokio::test]
    async fn test_bulk_validation() {
        let state = state();
        let too_many: Vec<Value> = (0..51).map(|i| json!({"data": i.to_string()})).collect();

        for body in [json!({}), json!({"items": []}), json!({"items": too_many})] {
            let response = send(&state, post_json("/generate-bulk", &body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
        assert_eq!(state.renderer.contexts().launched_total(), 0);
    }

    #[tokio::test]
    async fn test_no_context_leak_across_calls() {
        let state = state();
        for body in [
            json!({"data": "one"}),
            json!({"data": "two", "format": "png"}),
            json!({"data": ""}),
            json!({"data": "x".repeat(5000)}),
        ] {
            let _ = send(&state, post_json("/generate", &body)).await;
        }
        assert_eq!(state.renderer.contexts().live_contexts(), 0);
    }
}
