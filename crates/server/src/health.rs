use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub live_sessions: usize,
    pub checked_at: String,
}

/// Liveness probe. Session state is in-process, so a responding handler is
/// a healthy one; the count is reported for operator visibility.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let live_sessions = state.orchestrator.sessions().len().await;
    let payload = HealthResponse {
        status: "ready",
        live_sessions,
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}
