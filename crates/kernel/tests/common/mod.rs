#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] drives the REAL router and state over an in-memory document
//! store, with a fixed geocoder, a mailer that records what it sends, and a
//! private upload directory. Each test builds its own app, so tests never
//! share data.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use devcamper_kernel::models::{GeoLocation, User, UserInput};
use devcamper_kernel::services::email::Mailer;
use devcamper_kernel::services::geocoder::Geocoder;
use devcamper_kernel::store::MemoryDocumentStore;
use devcamper_kernel::{AppState, Config};
use devcamper_test_utils::TestUser;

pub const JWT_SECRET: &str = "integration-test-secret-of-32-bytes!!";

/// Known places, keyed by a zipcode that must appear in the address.
const PLACES: &[(&str, &str, f64, f64)] = &[
    ("02215", "Boston", -71.1043, 42.3505),
    ("02118", "Boston", -71.0707, 42.3388),
    ("01002", "Amherst", -72.5199, 42.3732),
    ("10001", "New York", -73.9967, 40.7506),
    ("90210", "Beverly Hills", -118.4065, 34.0901),
];

/// Geocoder resolving the zipcodes in [`PLACES`].
pub struct FixedGeocoder;

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>> {
        Ok(PLACES
            .iter()
            .find(|(zip, ..)| address.contains(zip))
            .map(|(zip, city, lng, lat)| {
                let mut location = GeoLocation::point(*lng, *lat);
                location.formatted_address = Some(address.to_string());
                location.city = Some(city.to_string());
                location.zipcode = Some(zip.to_string());
                location.country = Some("US".to_string());
                location
            }))
    }
}

/// One captured message.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer recording messages; can be told to fail.
#[derive(Clone, Default)]
pub struct CapturingMailer {
    pub sent: Arc<Mutex<Vec<SentMail>>>,
    pub fail: Arc<Mutex<bool>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if *self.fail.lock() {
            bail!("SMTP connection refused");
        }
        self.sent.lock().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub fn test_config(upload_dir: PathBuf) -> Config {
    Config {
        port: 0,
        production: false,
        database_url: "memory://".to_string(),
        database_max_connections: 1,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expire_days: 30,
        jwt_cookie_expire_days: 30,
        file_upload_path: upload_dir,
        files_url: "/uploads".to_string(),
        max_file_upload: 1_000,
        geocoder_api_key: None,
        geocoder_url: String::new(),
        cors_allowed_origins: vec!["*".to_string()],
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        smtp_encryption: "none".to_string(),
        smtp_from_email: "noreply@devcamper.io".to_string(),
        site_url: "http://devcamper.test".to_string(),
    }
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: CapturingMailer,
    pub upload_dir: PathBuf,
}

impl TestApp {
    /// App with geocoding enabled.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// App without a geocoder, as when no API key is configured.
    pub fn without_geocoder() -> Self {
        Self::build(false)
    }

    fn build(with_geocoder: bool) -> Self {
        let upload_dir = std::env::temp_dir().join(format!("devcamper-test-{}", Uuid::now_v7()));
        let mailer = CapturingMailer::default();
        let geocoder: Option<Box<dyn Geocoder>> = if with_geocoder {
            Some(Box::new(FixedGeocoder))
        } else {
            None
        };
        let state = AppState::from_parts(
            test_config(upload_dir.clone()),
            Arc::new(MemoryDocumentStore::new()),
            geocoder,
            Box::new(mailer.clone()),
        )
        .expect("failed to build state");

        Self {
            router: devcamper_kernel::app(state.clone()),
            state,
            mailer,
            upload_dir,
        }
    }

    /// Send a request through the full router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a JSON request, optionally authenticated, and decode the reply.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        // Bracketed filter keys, e.g. `averageCost[lte]`, written the way
        // a browser sends them.
        let uri = uri.replace('[', "%5B").replace(']', "%5D");
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.request(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body), token).await
    }

    pub async fn put(&self, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(body), Some(token)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, None, Some(token)).await
    }

    /// Register `user` and return the token.
    pub async fn register(&self, user: &TestUser) -> String {
        let (status, body) = self
            .post("/api/v1/auth/register", user.to_json(), None)
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Register a user with `role` and return the token.
    pub async fn register_as(&self, role: &str) -> String {
        self.register(&devcamper_test_utils::test_user(role)).await
    }

    /// Log in and return the token.
    pub async fn login(&self, user: &TestUser) -> String {
        let (status, body) = self
            .post("/api/v1/auth/login", user.credentials(), None)
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Create an admin directly in the store and log in.
    pub async fn admin_token(&self) -> String {
        let admin = devcamper_test_utils::test_user("admin");
        User::create(
            self.state.store(),
            UserInput {
                name: Some(admin.name.clone()),
                email: Some(admin.email.clone()),
                password: Some(admin.password.clone()),
                role: Some("admin".to_string()),
            },
        )
        .await
        .unwrap();
        self.login(&admin).await
    }

    /// Create a bootcamp as `token`'s user and return its id.
    pub async fn create_bootcamp(&self, token: &str, body: Value) -> String {
        let (status, body) = self.post("/api/v1/bootcamps", body, Some(token)).await;
        assert_eq!(status, StatusCode::CREATED, "create bootcamp failed: {body}");
        body["data"]["_id"].as_str().unwrap().to_string()
    }

    /// Create a course on `bootcamp` and return its id.
    pub async fn create_course(&self, token: &str, bootcamp: &str, body: Value) -> String {
        let (status, body) = self
            .post(&format!("/api/v1/bootcamps/{bootcamp}/courses"), body, Some(token))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create course failed: {body}");
        body["data"]["_id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.upload_dir).ok();
    }
}

/// Decode a response body as JSON (`Null` when empty).
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// Raw response body.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Extract Set-Cookie headers from a response for use in subsequent requests.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            // Extract just the cookie name=value, ignoring attributes
            cookie.split(';').next()
        })
        .collect::<Vec<_>>()
        .join("; ")
}
