//! Triggered classification handler

use axum::{extract::State, Json};
use skywatch_core::api::{TriggerRequest, TriggerResponse};

use crate::extract::FormOrJson;
use crate::{AppResult, AppState};

/// Run one classification pass for `table_name` and report the outcome
pub async fn trigger(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<TriggerRequest>,
) -> AppResult<Json<TriggerResponse>> {
    let response = state.console.trigger(request).await?;
    tracing::info!("Triggered pass for source {}: {}", response.source_id, response.message);
    Ok(Json(response))
}
