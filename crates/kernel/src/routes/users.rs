//! User administration. Every route requires the admin role.

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use super::{deleted, parse_id, query_pairs, single};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{Role, User, UserInput};
use crate::query::ResultEnvelope;
use crate::state::AppState;

const ADMINS: &[Role] = &[Role::Admin];

async fn find_user(state: &AppState, raw_id: &str) -> AppResult<User> {
    User::find_by_id(state.store(), parse_id(raw_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("User", raw_id))
}

/// GET /api/v1/users
async fn list_users(
    State(state): State<AppState>,
    admin: CurrentUser,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ResultEnvelope>> {
    admin.require_role(ADMINS)?;
    let params = query_pairs(query.as_deref());
    let envelope = state
        .listings()
        .users
        .execute(state.store(), &params)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/users/{id}
async fn get_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    admin.require_role(ADMINS)?;
    single(&find_user(&state, &id).await?)
}

/// POST /api/v1/users
async fn create_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(input): Json<UserInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    admin.require_role(ADMINS)?;
    let user = User::create(state.store(), input).await?;
    Ok((StatusCode::CREATED, single(&user)?))
}

/// PUT /api/v1/users/{id}
async fn update_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<UserInput>,
) -> AppResult<Json<Value>> {
    admin.require_role(ADMINS)?;
    let user = find_user(&state, &id).await?;
    let user = user.update(state.store(), input).await?;
    single(&user)
}

/// DELETE /api/v1/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    admin.require_role(ADMINS)?;
    let user = find_user(&state, &id).await?;
    User::delete(state.store(), user.id).await?;
    tracing::info!(id = %user.id, admin = %admin.id(), "user deleted");
    Ok(deleted())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}
