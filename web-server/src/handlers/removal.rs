//! Removal handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use skywatch_core::api::RemovalResponse;
use skywatch_core::logic::record::SourceId;
use validator::Validate;

use crate::extract::FormOrJson;
use crate::{AppError, AppResult, AppState};

/// Form fields arrive as text, JSON clients may send a number
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorId {
    Number(SourceId),
    Text(String),
}

impl SensorId {
    fn parse(&self) -> Result<SourceId, AppError> {
        match self {
            SensorId::Number(id) => Ok(*id),
            SensorId::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::ValidationError(format!("'{}' is not a valid sensor_id", raw))),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RemoveSensorRequest {
    #[validate(required(message = "sensor_id is required"))]
    pub sensor_id: Option<SensorId>,
}

/// Delete one source's records and drop it from the cache
pub async fn remove_sensor(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<RemoveSensorRequest>,
) -> AppResult<Json<RemovalResponse>> {
    request.validate()?;
    let source_id = match &request.sensor_id {
        Some(id) => id.parse()?,
        None => return Err(AppError::ValidationError("sensor_id is required".to_string())),
    };

    let response = state.console.remove_source(source_id).await?;
    tracing::info!("Sensor {} removed ({} records)", source_id, response.removed);
    Ok(Json(response))
}

/// Clear every source
pub async fn remove_all(State(state): State<AppState>) -> AppResult<Json<RemovalResponse>> {
    let response = state.console.remove_all().await?;
    tracing::info!("All sensors removed: {}", response.message);
    Ok(Json(response))
}
