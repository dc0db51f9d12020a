//! User model, password hashing and password-reset tokens.

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ModelResult, ValidationErrors, decode, encode, is_valid_email, load};
use crate::store::{Collection, DocumentStore, StoreError, field_filter};

const MIN_PASSWORD: usize = 6;

/// Reset tokens expire after this many minutes.
const RESET_TOKEN_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Publisher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "publisher" => Ok(Role::Publisher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("'{other}' is not a valid role")),
        }
    }
}

/// User record. Credential fields are never serialized; use
/// [`User::to_document`] for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing)]
    password: String,
    #[serde(default, skip_serializing)]
    reset_password_token: Option<String>,
    #[serde(default, skip_serializing, with = "super::timestamp::option")]
    reset_password_expire: Option<DateTime<Utc>>,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when registering or editing a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    errors.check(
        password.chars().count() < MIN_PASSWORD,
        "Password must be at least 6 characters",
    );
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("Please add an email");
    } else if !is_valid_email(email) {
        errors.add("Please add a valid email");
    }
}

fn parse_role(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<Role> {
    raw?.parse().map_err(|e: String| errors.add(e)).ok()
}

impl User {
    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Self>, StoreError> {
        load(store, Collection::Users, id).await
    }

    /// Look up by address, ignoring case.
    pub async fn find_by_email(
        store: &dyn DocumentStore,
        email: &str,
    ) -> Result<Option<Self>, StoreError> {
        let email = email.trim().to_lowercase();
        store
            .find_one(Collection::Users, &field_filter("email", email))
            .await?
            .map(decode)
            .transpose()
    }

    /// Create a user. The role defaults to `user`.
    pub async fn create(store: &dyn DocumentStore, input: UserInput) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        let name = input.name.map(|n| n.trim().to_string()).unwrap_or_default();
        let email = input
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        errors.check(name.is_empty(), "Please add a name");
        check_email(&email, &mut errors);
        match input.password.as_deref() {
            Some(p) => check_password(p, &mut errors),
            None => errors.add("Please add a password"),
        }
        let role = parse_role(input.role.as_deref(), &mut errors).unwrap_or_default();
        errors.into_result()?;

        let user = Self {
            id: Uuid::now_v7(),
            name,
            email,
            role,
            password: hash_password(input.password.as_deref().unwrap_or_default())?,
            reset_password_token: None,
            reset_password_expire: None,
            created_at: super::now(),
        };
        store.insert(Collection::Users, user.to_document()?).await?;
        tracing::info!(id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Apply the fields present in `input`. A new password is hashed.
    pub async fn update(mut self, store: &dyn DocumentStore, input: UserInput) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
            errors.check(self.name.is_empty(), "Please add a name");
        }
        if let Some(email) = input.email {
            self.email = email.trim().to_lowercase();
            check_email(&self.email, &mut errors);
        }
        if let Some(role) = parse_role(input.role.as_deref(), &mut errors) {
            self.role = role;
        }
        if let Some(password) = input.password.as_deref() {
            check_password(password, &mut errors);
        }
        errors.into_result()?;

        if let Some(password) = input.password.as_deref() {
            self.password = hash_password(password)?;
        }
        self.save(store).await?;
        Ok(self)
    }

    /// Replace the password, clearing any pending reset.
    pub async fn set_password(mut self, store: &dyn DocumentStore, password: &str) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        check_password(password, &mut errors);
        errors.into_result()?;

        self.password = hash_password(password)?;
        self.reset_password_token = None;
        self.reset_password_expire = None;
        self.save(store).await?;
        Ok(self)
    }

    pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        store.delete(Collection::Users, id).await
    }

    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Start a password reset. Returns the plain token to send; only its
    /// hash is stored.
    pub async fn issue_reset_token(&mut self, store: &dyn DocumentStore) -> Result<String, StoreError> {
        let token = generate_token();
        self.reset_password_token = Some(hash_token(&token));
        self.reset_password_expire = Some(super::now() + Duration::minutes(RESET_TOKEN_MINUTES));
        self.save(store).await?;
        Ok(token)
    }

    /// Abandon a pending reset, e.g. when the email could not be sent.
    pub async fn clear_reset_token(&mut self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        self.reset_password_token = None;
        self.reset_password_expire = None;
        self.save(store).await
    }

    /// The user holding an unexpired reset `token`.
    pub async fn find_by_reset_token(
        store: &dyn DocumentStore,
        token: &str,
    ) -> Result<Option<Self>, StoreError> {
        let filter = field_filter("resetPasswordToken", hash_token(token));
        let Some(user) = store
            .find_one(Collection::Users, &filter)
            .await?
            .map(decode::<Self>)
            .transpose()?
        else {
            return Ok(None);
        };
        let now = Utc::now();
        Ok(user
            .reset_password_expire
            .is_some_and(|expire| expire > now)
            .then_some(user))
    }

    /// Stored form, including credential fields.
    pub fn to_document(&self) -> Result<Value, StoreError> {
        let mut doc = encode(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("password".into(), Value::String(self.password.clone()));
            if let (Some(token), Some(expire)) =
                (&self.reset_password_token, &self.reset_password_expire)
            {
                map.insert("resetPasswordToken".into(), Value::String(token.clone()));
                map.insert(
                    "resetPasswordExpire".into(),
                    Value::String(expire.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
                );
            }
        }
        Ok(doc)
    }

    async fn save(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        store.replace(Collection::Users, self.to_document()?).await?;
        Ok(())
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// 20 random bytes as hex.
fn generate_token() -> String {
    let bytes: [u8; 20] = rand::random();
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
