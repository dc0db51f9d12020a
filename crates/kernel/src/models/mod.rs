//! Data models for bootcamps, courses, reviews and users.
//!
//! Models are stored as JSON documents; field names on the wire and in
//! storage are camelCase with the identity under `_id`.

pub mod bootcamp;
pub mod course;
pub mod review;
pub mod user;

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{Collection, DocumentStore, StoreError};

pub use bootcamp::{Bootcamp, BootcampInput, Career, GeoLocation};
pub use course::{Course, CourseInput, MinimumSkill};
pub use review::{Review, ReviewInput};
pub use user::{Role, User, UserInput};

/// Field validation failures, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .0.join(", "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Record `message` when `failed` holds.
    pub fn check(&mut self, failed: bool, message: &str) {
        if failed {
            self.add(message);
        }
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Failure of a model operation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Decode a stored document into a model.
pub(crate) fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Encode a model as a document.
pub(crate) fn encode<T: serde::Serialize>(model: &T) -> Result<Value, StoreError> {
    serde_json::to_value(model).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Load and decode one document by identity.
pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: Uuid,
) -> Result<Option<T>, StoreError> {
    store
        .find_by_id(collection, id)
        .await?
        .map(decode)
        .transpose()
}

/// Loose address check: one `@`, no spaces, a dotted domain.
#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[A-Za-z]{2,}$").expect("valid regex literal")
});

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Non-empty trimmed text, or None.
pub(crate) fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Timestamps stored as RFC 3339 with millisecond precision, so that their
/// text order matches time order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same format for optional timestamps.
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

/// Current time truncated to milliseconds.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "timestamp")]
        at: chrono::DateTime<Utc>,
    }

    #[test]
    fn validation_errors_join_with_commas() {
        let mut errors = ValidationErrors::new();
        errors.add("Please add a name");
        errors.check(true, "Please add a description");
        errors.check(false, "never");
        assert_eq!(
            errors.to_string(),
            "Please add a name, Please add a description"
        );
        assert!(errors.into_result().is_err());
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let whole = Stamped {
            at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&whole).unwrap();
        assert_eq!(json["at"], "2024-01-01T00:00:00.000Z");

        let back: Stamped = serde_json::from_value(json).unwrap();
        assert_eq!(back.at, whole.at);
    }

    #[test]
    fn email_check() {
        assert!(is_valid_email("john@gmail.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("john@gmail"));
        assert!(!is_valid_email("john gmail.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn clean_drops_blank_text() {
        assert_eq!(clean(Some("  x ".into())), Some("x".into()));
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(None), None);
    }
}
