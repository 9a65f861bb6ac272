//! Cycle statistics handler

use axum::{extract::State, Json};
use skywatch_core::api::ConsoleStatus;

use crate::AppState;

/// Last committed cycle summary plus cache and dispatcher facts
pub async fn get(State(state): State<AppState>) -> Json<ConsoleStatus> {
    Json(state.console.status())
}
