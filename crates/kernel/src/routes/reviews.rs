//! Review routes. Any signed-in user may review a bootcamp once.

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use super::{deleted, list, parse_id, query_pairs, single};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{Bootcamp, Review, ReviewInput, Role};
use crate::query::ResultEnvelope;
use crate::state::AppState;

const REVIEWERS: &[Role] = &[Role::User, Role::Admin];

async fn authored_review(state: &AppState, user: &CurrentUser, raw_id: &str, action: &str) -> AppResult<Review> {
    let review = Review::find_by_id(state.store(), parse_id(raw_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Review", raw_id))?;
    if !user.can_modify(review.user) {
        return Err(AppError::Unauthorized(format!(
            "Not authorized to {action} review {}",
            review.id
        )));
    }
    Ok(review)
}

/// GET /api/v1/reviews
async fn list_reviews(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ResultEnvelope>> {
    let params = query_pairs(query.as_deref());
    let envelope = state
        .listings()
        .reviews
        .execute(state.store(), &params)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/{id}/reviews
async fn bootcamp_reviews(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> AppResult<Json<Value>> {
    let reviews = Review::for_bootcamp(state.store(), parse_id(&bootcamp_id)?).await?;
    list(&reviews)
}

/// GET /api/v1/reviews/{id}
async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let review = Review::find_by_id(state.store(), parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Review", &id))?;

    super::single_with_bootcamp(&state, &review, review.bootcamp).await
}

/// POST /api/v1/bootcamps/{id}/reviews
async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bootcamp_id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require_role(REVIEWERS)?;
    let bootcamp = Bootcamp::find_by_id(state.store(), parse_id(&bootcamp_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Bootcamp", &bootcamp_id))?;

    let review = Review::create(state.store(), bootcamp.id, user.id(), input).await?;
    Ok((StatusCode::CREATED, single(&review)?))
}

/// PUT /api/v1/reviews/{id}
async fn update_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<Json<Value>> {
    let review = authored_review(&state, &user, &id, "update").await?;
    let review = review.update(state.store(), input).await?;
    single(&review)
}

/// DELETE /api/v1/reviews/{id}
async fn delete_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let review = authored_review(&state, &user, &id, "delete").await?;
    review.delete(state.store()).await?;
    Ok(deleted())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list_reviews))
        .route(
            "/reviews/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route(
            "/bootcamps/{id}/reviews",
            get(bootcamp_reviews).post(create_review),
        )
}
