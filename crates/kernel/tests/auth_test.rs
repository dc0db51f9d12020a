#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Authentication integration tests.
//!
//! Registration, login, token transport, profile updates and the password
//! reset flow.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use uuid::Uuid;

use common::{TestApp, body_json, extract_cookies};
use devcamper_kernel::store::{Collection, DocumentStore};
use devcamper_test_utils::{assert, test_user};

fn reset_token_from(mail: &str) -> String {
    let start = mail.find("resetpassword/").expect("no reset link") + "resetpassword/".len();
    mail[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect()
}

// -------------------------------------------------------------------------
// Register and login
// -------------------------------------------------------------------------

#[tokio::test]
async fn register_returns_token_and_cookie() {
    let app = TestApp::new();
    let user = test_user("publisher");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(user.to_json().to_string()))
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));
    assert!(!set_cookie.contains("Secure"));

    let cookies = extract_cookies(&response);
    let body = body_json(response).await;
    assert::success(&body);
    let token = body["token"].as_str().unwrap();
    assert_eq!(cookies, format!("token={token}"));
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/v1/auth/register",
            json!({ "name": "Jo", "email": "not-an-email", "password": "123" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error(
        &body,
        "Please add a valid email, Password must be at least 6 characters",
    );
}

#[tokio::test]
async fn register_refuses_admin_role() {
    let app = TestApp::new();
    let user = test_user("admin");

    let (status, body) = app.post("/api/v1/auth/register", user.to_json(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    let user = test_user("user");
    app.register(&user).await;

    let shouting = user.clone().with_email(&user.email.to_uppercase());
    let (status, body) = app
        .post("/api/v1/auth/register", shouting.to_json(), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error(&body, "Duplicate field value entered");
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = TestApp::new();
    let user = test_user("user");
    app.register(&user).await;

    let (status, body) = app
        .post("/api/v1/auth/login", json!({ "email": user.email }), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error(&body, "Please provide an email and password");

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "email": user.email, "password": "wrong-password" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error(&body, "Invalid credentials");

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "email": "nobody@example.com", "password": "123456" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error(&body, "Invalid credentials");

    let token = app.login(&user).await;
    assert!(!token.is_empty());
}

// -------------------------------------------------------------------------
// Token transport
// -------------------------------------------------------------------------

#[tokio::test]
async fn me_accepts_bearer_and_cookie() {
    let app = TestApp::new();
    let user = test_user("user");
    let token = app.register(&user).await;

    let (status, body) = app.get_as("/api/v1/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], user.email.as_str());
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("password").is_none());

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error(&body, "Not authorized to access this route");

    let (status, _) = app.get_as("/api/v1/auth/me", "not.a.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_replaces_the_cookie() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/auth/logout").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": {} }));

    let request = Request::builder()
        .uri("/api/v1/auth/logout")
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(extract_cookies(&response), "token=none");

    // The placeholder never authenticates.
    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, "token=none")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.request(request).await.status(), StatusCode::UNAUTHORIZED);
}

// -------------------------------------------------------------------------
// Profile
// -------------------------------------------------------------------------

#[tokio::test]
async fn update_details_changes_name_and_email_only() {
    let app = TestApp::new();
    let user = test_user("user");
    let token = app.register(&user).await;

    let (status, body) = app
        .put(
            "/api/v1/auth/updatedetails",
            json!({ "name": "Renamed", "email": "Renamed@Example.com", "role": "admin" }),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["email"], "renamed@example.com");
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn update_password_requires_the_current_one() {
    let app = TestApp::new();
    let user = test_user("user");
    let token = app.register(&user).await;

    let (status, body) = app
        .put(
            "/api/v1/auth/updatepassword",
            json!({ "currentPassword": "wrong", "newPassword": "654321" }),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error(&body, "Password is incorrect");

    let (status, body) = app
        .put(
            "/api/v1/auth/updatepassword",
            json!({ "currentPassword": "123456", "newPassword": "654321" }),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    app.login(&user.clone().with_password("654321")).await;
}

// -------------------------------------------------------------------------
// Password reset
// -------------------------------------------------------------------------

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/v1/auth/forgotpassword",
            json!({ "email": "ghost@example.com" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert::error(&body, "There is no user with that email");
    assert!(app.mailer.sent.lock().is_empty());
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = TestApp::new();
    let user = test_user("user");
    app.register(&user).await;

    let (status, body) = app
        .post(
            "/api/v1/auth/forgotpassword",
            json!({ "email": user.email }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "Email sent");

    let mail = app.mailer.sent.lock()[0].clone();
    assert_eq!(mail.to, user.email);
    assert::contains(
        &mail.body,
        "http://devcamper.test/api/v1/auth/resetpassword/",
    );
    let token = reset_token_from(&mail.body);
    assert_eq!(token.len(), 40);

    let reset_uri = format!("/api/v1/auth/resetpassword/{token}");
    let (status, body) = app
        .call(
            Method::PUT,
            &reset_uri,
            Some(json!({ "password": "new-secret" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].is_string());

    app.login(&user.clone().with_password("new-secret")).await;

    // Tokens are single-use.
    let (status, body) = app
        .call(
            Method::PUT,
            &reset_uri,
            Some(json!({ "password": "another-one" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error(&body, "Invalid token");
}

#[tokio::test]
async fn failed_reset_email_clears_the_token() {
    let app = TestApp::new();
    let user = test_user("user");
    let token = app.register(&user).await;
    let (_, me) = app.get_as("/api/v1/auth/me", &token).await;
    let id: Uuid = me["data"]["_id"].as_str().unwrap().parse().unwrap();

    *app.mailer.fail.lock() = true;
    let (status, body) = app
        .post(
            "/api/v1/auth/forgotpassword",
            json!({ "email": user.email }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let stored = app
        .state
        .store()
        .find_by_id(Collection::Users, id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.get("resetPasswordToken").is_none());
    assert!(stored.get("resetPasswordExpire").is_none());
}
