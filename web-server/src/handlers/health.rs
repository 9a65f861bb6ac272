//! Health check handler with a glimpse of the cache

use axum::{extract::State, Json};
use serde::Serialize;
use skywatch_core::constants::{APP_NAME, APP_VERSION};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    environment: String,
    /// Cache generation; advances with every commit or removal
    generation: u64,
    cached_sources: usize,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.console.snapshot();

    Json(HealthResponse {
        status: "healthy",
        service: APP_NAME,
        version: APP_VERSION,
        environment: state.config.environment.clone(),
        generation: snapshot.generation,
        cached_sources: snapshot.len(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
