// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP API for a running controller.
//!
//! - `GET /healthz`: liveness
//! - `GET /apdex`: last published score
//! - `GET /metrics`: Prometheus exposition
//! - `POST /messages`: inject a scenario (command mode only)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use loadspin_core::{CommandInjector, ControllerHandle};

use crate::metrics;

/// Body of `POST /messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub scenario: String,
}

/// Body of `GET /apdex`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApdexResponse {
    pub score: f64,
}

/// State shared by every handler.
#[derive(Clone)]
pub struct ApiState {
    controller: ControllerHandle,
    /// Present in command mode only.
    injector: Option<CommandInjector>,
}

impl ApiState {
    pub fn new(controller: ControllerHandle, injector: Option<CommandInjector>) -> Self {
        Self {
            controller,
            injector,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let mut app: Router<ApiState> = Router::new()
        .route("/healthz", get(healthz))
        .route("/apdex", get(apdex))
        .route("/metrics", get(metrics_handler));

    if state.injector.is_some() {
        app = app.route("/messages", post(post_message));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz() -> &'static str {
    "OK"
}

async fn apdex(State(state): State<ApiState>) -> Json<ApdexResponse> {
    Json(ApdexResponse {
        score: state.controller.score().await,
    })
}

async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    metrics::observe(&state.controller.snapshot().await);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

async fn post_message(
    State(state): State<ApiState>,
    Json(message): Json<MessageRequest>,
) -> StatusCode {
    let Some(injector) = &state.injector else {
        return StatusCode::NOT_FOUND;
    };

    match injector.inject(&message.scenario).await {
        Ok(()) => {
            tracing::debug!(scenario = %message.scenario, "Scenario accepted");
            StatusCode::ACCEPTED
        }
        Err(e) => {
            tracing::error!(scenario = %message.scenario, error = %e, "Failed to inject scenario");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use loadspin_core::{Config, ConfigLoader, Controller, MemoryRepo, ScalingSource};

    fn config() -> Config {
        ConfigLoader::load_string("region: aws-eu-west-2\nrepo:\n  kind: memory\n").unwrap()
    }

    /// Controller over an in-memory repo, with injection wired when `command` is set.
    fn start(command: bool) -> ApiState {
        let config = config();
        let repo = Arc::new(MemoryRepo::with_accounts(vec!["a".into(), "b".into()]));
        let (tx, rx) = mpsc::channel(16);
        let (controller, handle) = Controller::new(&config, repo, rx).unwrap();
        tokio::spawn(controller.run());

        let injector = command.then(|| {
            let (injector, source) = CommandInjector::channel(config.command.injection_capacity);
            tokio::spawn(Box::new(source).run(tx));
            injector
        });

        ApiState::new(handle, injector)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = router(start(false));
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn test_apdex_shape() {
        let app = router(start(false));
        let response = app
            .oneshot(Request::get("/apdex").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body, serde_json::json!({ "score": 0.0 }));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let app = router(start(false));
        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_messages_absent_in_target_mode() {
        let app = router(start(false));
        let response = app
            .oneshot(post_json("/messages", r#"{"scenario":"scale-up-eu"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_messages_route_into_controller() {
        let state = start(true);
        let controller = state.controller.clone();
        let app = router(state);

        let response = app
            .oneshot(post_json("/messages", r#"{"scenario":"scale-up-eu"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let mut size = 0;
        for _ in 0..100 {
            size = controller.pool_size().await;
            if size == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(size, 1);
        controller.shutdown();
    }

    #[tokio::test]
    async fn test_messages_rejects_missing_scenario() {
        let app = router(start(true));
        let response = app
            .oneshot(post_json("/messages", r#"{"region":"eu"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let app = router(start(false));
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("loadspin_apdex_score 0"));
        assert!(body.contains("loadspin_workers 0"));
        assert!(body.contains("loadspin_requests_per_second 0"));
    }
}
