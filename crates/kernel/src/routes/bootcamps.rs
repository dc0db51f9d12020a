//! Bootcamp routes.

use axum::extract::{Multipart, Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::{deleted, list, parse_id, query_pairs, single};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::bootcamp::within_radius;
use crate::models::{Bootcamp, BootcampInput, GeoLocation, Role};
use crate::query::ResultEnvelope;
use crate::query::types::EARTH_RADIUS_MILES;
use crate::state::AppState;
use crate::store::{Collection, FindOptions};

const PUBLISHERS: &[Role] = &[Role::Publisher, Role::Admin];

/// Geocode `address` when both it and a geocoder are present.
async fn locate(state: &AppState, address: Option<&str>) -> AppResult<Option<GeoLocation>> {
    let address = address.map(str::trim).filter(|a| !a.is_empty());
    let (Some(geocoder), Some(address)) = (state.geocoder(), address) else {
        return Ok(None);
    };
    Ok(geocoder.geocode(address).await?)
}

/// Load a bootcamp the caller may modify.
async fn owned_bootcamp(state: &AppState, user: &CurrentUser, raw_id: &str, action: &str) -> AppResult<Bootcamp> {
    user.require_role(PUBLISHERS)?;
    let id = parse_id(raw_id)?;
    let bootcamp = Bootcamp::find_by_id(state.store(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Bootcamp", raw_id))?;
    if !user.can_modify(bootcamp.user) {
        return Err(AppError::Unauthorized(format!(
            "User {} is not authorized to {action} this bootcamp",
            user.id()
        )));
    }
    Ok(bootcamp)
}

/// GET /api/v1/bootcamps
async fn list_bootcamps(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ResultEnvelope>> {
    let params = query_pairs(query.as_deref());
    let envelope = state
        .listings()
        .bootcamps
        .execute(state.store(), &params)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/{id}
async fn get_bootcamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let bootcamp = Bootcamp::find_by_id(state.store(), parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Bootcamp", &id))?;
    single(&bootcamp)
}

/// POST /api/v1/bootcamps
async fn create_bootcamp(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<BootcampInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require_role(PUBLISHERS)?;

    // Publishers may own a single bootcamp.
    if !user.is_admin()
        && Bootcamp::find_by_owner(state.store(), user.id())
            .await?
            .is_some()
    {
        return Err(AppError::BadRequest(format!(
            "The user with ID {} has already published a bootcamp",
            user.id()
        )));
    }

    let location = locate(&state, input.address.as_deref()).await?;
    let bootcamp = Bootcamp::create(state.store(), user.id(), input, location).await?;
    Ok((StatusCode::CREATED, single(&bootcamp)?))
}

/// PUT /api/v1/bootcamps/{id}
async fn update_bootcamp(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<BootcampInput>,
) -> AppResult<Json<Value>> {
    let bootcamp = owned_bootcamp(&state, &user, &id, "update").await?;
    let location = locate(&state, input.address.as_deref()).await?;
    let bootcamp = bootcamp.update(state.store(), input, location).await?;
    single(&bootcamp)
}

/// DELETE /api/v1/bootcamps/{id}
async fn delete_bootcamp(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let bootcamp = owned_bootcamp(&state, &user, &id, "delete").await?;
    Bootcamp::delete(state.store(), bootcamp.id).await?;
    Ok(deleted())
}

/// GET /api/v1/bootcamps/radius/{zipcode}/{distance}
///
/// `distance` is in miles.
async fn bootcamps_in_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::BadRequest("Please provide a valid distance".to_string()))?;
    let Some(geocoder) = state.geocoder() else {
        return Err(AppError::ServiceUnavailable(
            "Geocoding is not configured".to_string(),
        ));
    };
    let center = geocoder
        .geocode(&zipcode)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No location found for {zipcode}")))?;

    let filter = within_radius(center.center(), distance / EARTH_RADIUS_MILES);
    let bootcamps = state
        .store()
        .find(Collection::Bootcamps, &filter, &FindOptions::default())
        .await?;
    list(&bootcamps)
}

/// PUT /api/v1/bootcamps/{id}/photo
async fn upload_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let bootcamp = owned_bootcamp(&state, &user, &id, "update").await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        upload = Some((file_name, content_type, data));
        break;
    }
    let Some((file_name, content_type, data)) = upload else {
        return Err(AppError::BadRequest("Please upload a file".to_string()));
    };

    let name = state
        .photos()
        .save(
            bootcamp.id,
            file_name.as_deref(),
            content_type.as_deref(),
            &data,
        )
        .await?;
    bootcamp.set_photo(state.store(), name.clone()).await?;
    Ok(Json(json!({ "success": true, "data": name })))
}

/// Create the bootcamp router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bootcamps", get(list_bootcamps).post(create_bootcamp))
        .route(
            "/bootcamps/{id}",
            get(get_bootcamp).put(update_bootcamp).delete(delete_bootcamp),
        )
        .route(
            "/bootcamps/radius/{zipcode}/{distance}",
            get(bootcamps_in_radius),
        )
        .route("/bootcamps/{id}/photo", put(upload_photo))
}
