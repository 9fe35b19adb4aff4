use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.hub.is_closed() { "closed" } else { "ok" };
    Json(HealthResponse {
        status,
        connections: state.hub.member_count(),
    })
}
