//! DevCamper test utilities.
//!
//! Helpers for integration testing: request-body builders for bootcamps,
//! courses, reviews and users, and assertion utilities for API envelopes.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Short unique suffix for names and emails that must not collide.
pub fn unique_suffix() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Create a bootcamp body with default values.
pub fn test_bootcamp(name: &str) -> TestBootcamp {
    TestBootcamp {
        name: name.to_string(),
        description: format!("{name} teaches full stack development"),
        website: Some("https://example.com".to_string()),
        phone: Some("(111) 111-1111".to_string()),
        email: Some("enroll@example.com".to_string()),
        address: Some("233 Bay State Rd Boston MA 02215".to_string()),
        careers: vec!["Web Development".to_string()],
        housing: false,
        job_assistance: false,
        job_guarantee: false,
        accept_gi: false,
    }
}

/// A bootcamp request body builder.
#[derive(Debug, Clone)]
pub struct TestBootcamp {
    pub name: String,
    pub description: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub careers: Vec<String>,
    pub housing: bool,
    pub job_assistance: bool,
    pub job_guarantee: bool,
    pub accept_gi: bool,
}

impl TestBootcamp {
    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn without_address(mut self) -> Self {
        self.address = None;
        self
    }

    pub fn with_careers(mut self, careers: &[&str]) -> Self {
        self.careers = careers.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_housing(mut self) -> Self {
        self.housing = true;
        self
    }

    pub fn with_job_guarantee(mut self) -> Self {
        self.job_guarantee = true;
        self
    }

    /// JSON body for POST /api/v1/bootcamps.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "name": self.name,
            "description": self.description,
            "website": self.website,
            "phone": self.phone,
            "email": self.email,
            "address": self.address,
            "careers": self.careers,
            "housing": self.housing,
            "jobAssistance": self.job_assistance,
            "jobGuarantee": self.job_guarantee,
            "acceptGi": self.accept_gi,
        })
    }
}

/// Create a course body.
pub fn test_course(title: &str, tuition: u64) -> TestCourse {
    TestCourse {
        title: title.to_string(),
        description: format!("{title} covers the fundamentals"),
        weeks: 8,
        tuition,
        minimum_skill: "beginner".to_string(),
        scholarship_available: false,
    }
}

/// A course request body builder.
#[derive(Debug, Clone)]
pub struct TestCourse {
    pub title: String,
    pub description: String,
    pub weeks: u32,
    pub tuition: u64,
    pub minimum_skill: String,
    pub scholarship_available: bool,
}

impl TestCourse {
    pub fn with_weeks(mut self, weeks: u32) -> Self {
        self.weeks = weeks;
        self
    }

    pub fn with_minimum_skill(mut self, skill: &str) -> Self {
        self.minimum_skill = skill.to_string();
        self
    }

    pub fn with_scholarship(mut self) -> Self {
        self.scholarship_available = true;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "title": self.title,
            "description": self.description,
            "weeks": self.weeks,
            "tuition": self.tuition,
            "minimumSkill": self.minimum_skill,
            "scholarshipAvailable": self.scholarship_available,
        })
    }
}

/// Create a review body.
pub fn test_review(title: &str, rating: i64) -> JsonValue {
    json!({
        "title": title,
        "text": format!("{title}: would recommend"),
        "rating": rating,
    })
}

/// Create a user with a unique email and the given role.
pub fn test_user(role: &str) -> TestUser {
    TestUser {
        name: format!("Test {role}"),
        email: format!("{role}-{}@example.com", unique_suffix()),
        password: "123456".to_string(),
        role: role.to_string(),
    }
}

/// A user registration body builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl TestUser {
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// JSON body for POST /api/v1/auth/register.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "name": self.name,
            "email": self.email,
            "password": self.password,
            "role": self.role,
        })
    }

    /// JSON body for POST /api/v1/auth/login.
    pub fn credentials(&self) -> JsonValue {
        json!({ "email": self.email, "password": self.password })
    }
}

/// Assertion helpers for API responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert a `{success: true, ...}` body.
    pub fn success(body: &Value) {
        assert_eq!(
            body.get("success"),
            Some(&Value::Bool(true)),
            "Expected success, got: {body}"
        );
    }

    /// Assert a `{success: false, error}` body carrying `message`.
    pub fn error(body: &Value, message: &str) {
        assert_eq!(
            body.get("success"),
            Some(&Value::Bool(false)),
            "Expected failure, got: {body}"
        );
        assert_eq!(
            body.get("error").and_then(Value::as_str),
            Some(message),
            "Unexpected error in: {body}"
        );
    }

    /// The `data` array of a list response.
    pub fn data_array(body: &Value) -> &Vec<Value> {
        match body.get("data") {
            Some(Value::Array(items)) => items,
            _ => panic!("Expected a data array, got: {body}"),
        }
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}
