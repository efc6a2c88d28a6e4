//! HTTP server exposing the analyzer.
//!
//! - `POST /analyze` with `{"text": "..."}` returns `{"emotion", "stress", "scores"}`
//! - `GET /health` returns `{"ok": true}`

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::analysis::{AnalysisError, AnalysisResult, Analyzer};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Body of `POST /analyze`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        error!("Analysis failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Internal Server Error" })),
        )
            .into_response()
    }
}

/// Build the router with CORS open to any origin
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until Ctrl+C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Emotion service listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Emotion service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

/// Liveness only; no dependency checks
async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AnalysisError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("analyze", %request_id);

    let analyzer = state.analyzer.clone();
    // Inference is CPU-bound; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        analyzer.analyze(req.text.as_deref())
    })
    .await
    .map_err(|e| AnalysisError::Worker(e.to_string()))??;

    Ok(Json(result))
}
