//! Authentication routes.
//!
//! Successful sign-ins answer `{success, token}` and set the same token in
//! an HttpOnly `token` cookie.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{API_PREFIX, single};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::middleware::auth::TOKEN_COOKIE;
use crate::models::{Role, User, UserInput};
use crate::services::email::password_reset_message;
use crate::state::AppState;

/// Lifetime of the cookie that replaces the token on logout.
const LOGOUT_COOKIE_SECS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

/// `Set-Cookie` value for the login cookie.
fn token_cookie(value: &str, expires: DateTime<Utc>, secure: bool) -> String {
    let mut cookie = format!(
        "{TOKEN_COOKIE}={value}; Path=/; HttpOnly; Expires={}",
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Sign a token for `user` and answer with it in body and cookie.
fn token_response(state: &AppState, user: &User, status: StatusCode) -> AppResult<Response> {
    let token = state.tokens().issue(user.id)?;
    let expires = Utc::now() + Duration::days(state.config().jwt_cookie_expire_days);
    let cookie = token_cookie(&token, expires, state.config().production);
    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "token": token })),
    )
        .into_response())
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> AppResult<Response> {
    // Admins are only created by other admins or the seeder.
    if let Some(role) = input.role.as_deref()
        && matches!(role.parse::<Role>(), Ok(Role::Admin))
    {
        return Err(AppError::BadRequest(format!("'{role}' is not a valid role")));
    }

    let user = User::create(state.store(), input).await?;
    info!(user_id = %user.id, "user registered");
    token_response(&state, &user, StatusCode::OK)
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Response> {
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.trim().is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide an email and password".to_string(),
        ));
    };

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
    let user = User::find_by_email(state.store(), &email)
        .await?
        .ok_or_else(invalid)?;
    if !user.verify_password(&password) {
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    token_response(&state, &user, StatusCode::OK)
}

/// GET /api/v1/auth/logout
async fn logout(State(state): State<AppState>) -> Response {
    let expires = Utc::now() + Duration::seconds(LOGOUT_COOKIE_SECS);
    let cookie = token_cookie("none", expires, state.config().production);
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "data": {} })),
    )
        .into_response()
}

/// GET /api/v1/auth/me
async fn me(CurrentUser(user): CurrentUser) -> AppResult<Json<Value>> {
    single(&user)
}

/// PUT /api/v1/auth/updatedetails
async fn update_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateDetailsRequest>,
) -> AppResult<Json<Value>> {
    let input = UserInput {
        name: request.name,
        email: request.email,
        ..Default::default()
    };
    let user = user.update(state.store(), input).await?;
    single(&user)
}

/// PUT /api/v1/auth/updatepassword
async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdatePasswordRequest>,
) -> AppResult<Response> {
    let current = request.current_password.unwrap_or_default();
    if !user.verify_password(&current) {
        return Err(AppError::Unauthorized("Password is incorrect".to_string()));
    }

    let new_password = request.new_password.unwrap_or_default();
    let user = user.set_password(state.store(), &new_password).await?;
    info!(user_id = %user.id, "password changed");
    token_response(&state, &user, StatusCode::OK)
}

/// POST /api/v1/auth/forgotpassword
async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> AppResult<Json<Value>> {
    let email = request.email.unwrap_or_default();
    let Some(mut user) = User::find_by_email(state.store(), &email).await? else {
        return Err(AppError::NotFound(
            "There is no user with that email".to_string(),
        ));
    };

    let token = user.issue_reset_token(state.store()).await?;
    let reset_url = format!(
        "{}{API_PREFIX}/auth/resetpassword/{token}",
        state.config().site_url.trim_end_matches('/')
    );

    if let Err(e) = state
        .mailer()
        .send(
            &user.email,
            "Password reset token",
            &password_reset_message(&reset_url),
        )
        .await
    {
        warn!(user_id = %user.id, error = %e, "password reset email failed");
        user.clear_reset_token(state.store()).await?;
        return Err(AppError::Internal(e.context("Email could not be sent")));
    }

    Ok(Json(json!({ "success": true, "data": "Email sent" })))
}

/// PUT /api/v1/auth/resetpassword/{resettoken}
async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Response> {
    let user = User::find_by_reset_token(state.store(), &reset_token)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid token".to_string()))?;

    let password = request.password.unwrap_or_default();
    let user = user.set_password(state.store(), &password).await?;
    info!(user_id = %user.id, "password reset");
    token_response(&state, &user, StatusCode::OK)
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/me", get(me))
        .route("/auth/updatedetails", put(update_details))
        .route("/auth/updatepassword", put(update_password))
        .route("/auth/forgotpassword", post(forgot_password))
        .route("/auth/resetpassword/{resettoken}", put(reset_password))
}
