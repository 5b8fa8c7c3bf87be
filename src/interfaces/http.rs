//! Gateway callback and health check over HTTP.

use crate::application::engine::DialogEngine;
use crate::domain::gateway::UssdRequest;
use axum::{
    Form, Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<DialogEngine>,
    started: Instant,
}

impl AppState {
    pub fn new(engine: Arc<DialogEngine>) -> Self {
        Self {
            engine,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_sessions: usize,
    uptime_secs: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Gateway callback
        .route("/", post(handle_exchange))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_exchange(
    State(state): State<AppState>,
    Form(request): Form<UssdRequest>,
) -> impl IntoResponse {
    let reply = state.engine.handle(&request).await;
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        reply.to_string(),
    )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.engine.active_sessions().await,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
