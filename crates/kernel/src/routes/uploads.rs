//! Serves stored bootcamp photos.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

async fn serve_photo(State(state): State<AppState>, Path(file): Path<String>) -> AppResult<Response> {
    let (data, mime) = state
        .photos()
        .read(&file)
        .await
        .ok_or_else(|| AppError::NotFound(format!("File {file} not found")))?;
    Ok(([(header::CONTENT_TYPE, mime)], data).into_response())
}

/// Photo router mounted under `base` (the configured `FILES_URL`).
pub fn router(base: &str) -> Router<AppState> {
    let base = base.trim_end_matches('/');
    Router::new().route(&format!("{base}/{{file}}"), get(serve_photo))
}
