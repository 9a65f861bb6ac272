//! Snapshot views: overview, image grid and payload bytes

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use skywatch_core::api::ImageView;
use skywatch_core::constants::APP_NAME;
use skywatch_core::logic::cache::EntryOverview;
use skywatch_core::logic::record::SourceId;

use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
pub struct IndexResponse {
    app: &'static str,
    generation: u64,
    sources: Vec<EntryOverview>,
}

/// Overview of every cached source
pub async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    let snapshot = state.console.snapshot();
    Json(IndexResponse {
        app: APP_NAME,
        generation: snapshot.generation,
        sources: snapshot.overview(),
    })
}

/// Image grid data; empty list when nothing is cached
pub async fn list(State(state): State<AppState>) -> Json<Vec<ImageView>> {
    Json(state.console.images())
}

/// Raw payload of a source's cached record
pub async fn payload(
    State(state): State<AppState>,
    Path(source_id): Path<SourceId>,
) -> AppResult<impl IntoResponse> {
    let image = state
        .console
        .image(source_id)
        .ok_or_else(|| AppError::NotFound(format!("no data for source {}", source_id)))?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime),
            (header::CACHE_CONTROL, "no-store"),
        ],
        image.bytes,
    ))
}
