//! Control-plane HTTP surface
//!
//! Exposes the tunnel's traffic stream, log stream and config operations.

mod common;
mod configs;
mod logs;
mod traffic;

pub use common::{ApiError, ApiResult};

use crate::tunnel::Tunnel;
use crate::Result;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub tunnel: Arc<Tunnel>,
}

impl AppState {
    pub fn new(tunnel: Arc<Tunnel>) -> Self {
        AppState { tunnel }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/traffic", get(traffic::traffic_stream))
        .route("/logs", get(logs::logs_stream))
        .route(
            "/configs",
            get(configs::get_configs).put(configs::reload_configs),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control API listening on {}", addr);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(Tunnel::new("unused-config.yaml"))
    }

    #[tokio::test]
    async fn test_get_configs_snapshot() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/configs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let proxies = value["proxies"].as_array().unwrap();
        assert!(proxies.iter().any(|p| p == "DIRECT"));
        assert!(proxies.iter().any(|p| p == "REJECT"));
    }

    #[tokio::test]
    async fn test_logs_rejects_unknown_level() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/logs?level=loud")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_traffic_stream_starts() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/traffic")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reload_with_missing_document_is_client_error() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/configs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
