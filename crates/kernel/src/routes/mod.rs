//! HTTP route handlers.
//!
//! Resource routes live under `/api/v1`; `/health` and the photo files
//! are mounted at the root.

pub mod auth;
pub mod bootcamps;
pub mod courses;
pub mod health;
pub mod reviews;
pub mod uploads;
pub mod users;

use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Bootcamp;
use crate::state::AppState;

/// Prefix of every resource route.
pub const API_PREFIX: &str = "/api/v1";

/// All routes. Resource routes are nested under [`API_PREFIX`]; photos
/// are served under `files_url`.
pub fn api_router(files_url: &str) -> Router<AppState> {
    let api = Router::new()
        .merge(auth::router())
        .merge(bootcamps::router())
        .merge(courses::router())
        .merge(reviews::router())
        .merge(users::router());
    Router::new()
        .nest(API_PREFIX, api)
        .merge(health::router())
        .merge(uploads::router(files_url))
}

/// Query string as ordered `(key, value)` pairs, percent-decoded.
pub(crate) fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Identity from a path segment. Malformed ids name nothing.
pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Resource not found".to_string()))
}

/// `{success: true, data}`
pub(crate) fn single<T: Serialize>(data: &T) -> AppResult<Json<Value>> {
    let data = serde_json::to_value(data).map_err(anyhow::Error::from)?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// `{success: true, count, data}` for unpaginated lists.
pub(crate) fn list<T: Serialize>(items: &[T]) -> AppResult<Json<Value>> {
    let data = serde_json::to_value(items).map_err(anyhow::Error::from)?;
    Ok(Json(
        json!({ "success": true, "count": items.len(), "data": data }),
    ))
}

/// `{success: true, data}` where `data.bootcamp` carries the bootcamp's
/// name and description instead of its bare id.
pub(crate) async fn single_with_bootcamp<T: Serialize>(
    state: &AppState,
    record: &T,
    bootcamp_id: Uuid,
) -> AppResult<Json<Value>> {
    let mut data = serde_json::to_value(record).map_err(anyhow::Error::from)?;
    if let (Value::Object(map), Some(bootcamp)) = (
        &mut data,
        Bootcamp::find_by_id(state.store(), bootcamp_id).await?,
    ) {
        map.insert(
            "bootcamp".to_string(),
            json!({
                "_id": bootcamp.id,
                "name": bootcamp.name,
                "description": bootcamp.description,
            }),
        );
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

/// `{success: true, data: {}}` after a delete.
pub(crate) fn deleted() -> Json<Value> {
    Json(json!({ "success": true, "data": {} }))
}
