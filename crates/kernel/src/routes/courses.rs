//! Course routes.

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use super::{deleted, list, parse_id, query_pairs};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{Bootcamp, Course, CourseInput, Role};
use crate::query::ResultEnvelope;
use crate::state::AppState;

const PUBLISHERS: &[Role] = &[Role::Publisher, Role::Admin];

async fn owned_course(state: &AppState, user: &CurrentUser, raw_id: &str, action: &str) -> AppResult<Course> {
    user.require_role(PUBLISHERS)?;
    let course = Course::find_by_id(state.store(), parse_id(raw_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Course", raw_id))?;
    if !user.can_modify(course.user) {
        return Err(AppError::Unauthorized(format!(
            "User {} is not authorized to {action} course {}",
            user.id(),
            course.id
        )));
    }
    Ok(course)
}

/// GET /api/v1/courses
async fn list_courses(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ResultEnvelope>> {
    let params = query_pairs(query.as_deref());
    let envelope = state
        .listings()
        .courses
        .execute(state.store(), &params)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/{id}/courses
async fn bootcamp_courses(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> AppResult<Json<Value>> {
    let courses = Course::for_bootcamp(state.store(), parse_id(&bootcamp_id)?).await?;
    list(&courses)
}

/// GET /api/v1/courses/{id}
async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let course = Course::find_by_id(state.store(), parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Course", &id))?;
    super::single_with_bootcamp(&state, &course, course.bootcamp).await
}

/// POST /api/v1/bootcamps/{id}/courses
async fn create_course(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bootcamp_id): Path<String>,
    Json(input): Json<CourseInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require_role(PUBLISHERS)?;
    let bootcamp = Bootcamp::find_by_id(state.store(), parse_id(&bootcamp_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Bootcamp", &bootcamp_id))?;
    if !user.can_modify(bootcamp.user) {
        return Err(AppError::Unauthorized(format!(
            "User {} is not authorized to add a course to bootcamp {}",
            user.id(),
            bootcamp.id
        )));
    }

    let course = Course::create(state.store(), bootcamp.id, user.id(), input).await?;
    Ok((StatusCode::CREATED, super::single(&course)?))
}

/// PUT /api/v1/courses/{id}
async fn update_course(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> AppResult<Json<Value>> {
    let course = owned_course(&state, &user, &id, "update").await?;
    let course = course.update(state.store(), input).await?;
    super::single(&course)
}

/// DELETE /api/v1/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let course = owned_course(&state, &user, &id, "delete").await?;
    course.delete(state.store()).await?;
    Ok(deleted())
}

/// Create the course router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route(
            "/courses/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route(
            "/bootcamps/{id}/courses",
            get(bootcamp_courses).post(create_course),
        )
}
