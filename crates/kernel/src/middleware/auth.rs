//! Token authentication.
//!
//! Reads a login token from `Authorization: Bearer <token>` or the `token`
//! cookie, verifies it and attaches the [`CurrentUser`] to the request.
//! Requests without a valid token pass through anonymously; protected
//! handlers reject them by extracting [`CurrentUser`].

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::state::AppState;

/// Name of the login cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Token from the bearer header, falling back to the cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty() && *value != "none")
        .map(|(_, value)| value.to_string())
}

/// Middleware resolving the login token into a [`CurrentUser`].
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = token_from_headers(request.headers()) else {
        return next.run(request).await;
    };

    let user_id = match state.tokens().verify(&token) {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, "rejected login token");
            return next.run(request).await;
        }
    };

    match User::find_by_id(state.store(), user_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
        }
        Ok(None) => debug!(%user_id, "token for a deleted user"),
        Err(e) => warn!(error = %e, "failed to load token user"),
    }

    next.run(request).await
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(AppError::not_authorized)
    }
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Role::Admin
    }

    /// 403 unless the caller has one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                self.0.role
            )))
        }
    }

    /// Whether the caller owns a record owned by `owner`, or is an admin.
    pub fn can_modify(&self, owner: Uuid) -> bool {
        self.is_admin() || self.0.id == owner
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn logged_out_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=none"));
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(token_from_headers(&headers), None);
    }
}
