//! Document persistence.
//!
//! Records are JSON documents grouped into collections. Two backends share
//! the same filter, sort and uniqueness semantics:
//! - [`PgDocumentStore`]: PostgreSQL JSONB, SQL built with SeaQuery
//! - [`MemoryDocumentStore`]: in-process, for tests and `memory://`

mod matcher;
mod memory;
mod postgres;
mod query_builder;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::query::types::ID_FIELD;
use crate::query::{Condition, FieldPath, Filter, FilterValue, SortKey};

pub use matcher::{compare_json, json_eq};
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use query_builder::DocumentQueryBuilder;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate field value entered")]
    Duplicate,

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("malformed document: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Bootcamps,
    Courses,
    Reviews,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Bootcamps,
        Collection::Courses,
        Collection::Reviews,
        Collection::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Bootcamps => "bootcamps",
            Collection::Courses => "courses",
            Collection::Reviews => "reviews",
            Collection::Users => "users",
        }
    }

    /// Fields never returned by listings.
    pub fn hidden_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["password", "resetPasswordToken", "resetPasswordExpire"],
            _ => &[],
        }
    }

    /// Field groups whose combined values must be unique. Mirrored by the
    /// partial unique indexes in the migrations.
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            Collection::Bootcamps => &[&["name"]],
            Collection::Users => &[&["email"]],
            Collection::Reviews => &[&["bootcamp", "user"]],
            Collection::Courses => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

/// Ordering and window for a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Persistence collaborator used by handlers and the listing pipeline.
///
/// Results are ordered by `options.sort` and then by `_id` ascending, which
/// for UUIDv7 identities is insertion order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of documents matching `filter`.
    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Documents matching `filter`.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    /// Insert a document carrying its own `_id`.
    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), StoreError>;

    /// Replace the document with the same `_id`. Returns false when absent.
    async fn replace(&self, collection: Collection, doc: Value) -> Result<bool, StoreError>;

    /// Merge top-level `fields` into the document `id` in one write; a null
    /// value removes the field. Returns false when absent.
    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError>;

    /// Delete by identity. Returns false when absent.
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Delete everything matching `filter`.
    async fn delete_many(&self, collection: Collection, filter: &Filter)
    -> Result<u64, StoreError>;

    /// Whether the backend answers.
    async fn ping(&self) -> bool;

    /// First document matching `filter` in `_id` order.
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let options = FindOptions {
            limit: Some(1),
            ..Default::default()
        };
        Ok(self
            .find(collection, filter, &options)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        self.find_one(collection, &id_filter(id)).await
    }
}

/// Filter selecting one document by identity.
pub fn id_filter(id: Uuid) -> Filter {
    Filter::new().and(Condition::eq(
        id_path(),
        FilterValue::String(id.to_string()),
    ))
}

/// Filter on a single field named in code.
pub fn field_filter(field: &str, value: impl Into<Value>) -> Filter {
    let value = match value.into() {
        Value::Bool(b) => FilterValue::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FilterValue::Integer(i),
            None => FilterValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => FilterValue::String(s),
        other => FilterValue::String(other.to_string()),
    };
    Filter::new().and(Condition::eq(FieldPath::known(field), value))
}

fn id_path() -> FieldPath {
    FieldPath::known(ID_FIELD)
}

/// Identity of a stored document.
pub fn document_id(doc: &Value) -> Result<Uuid, StoreError> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::Corrupt("document has no valid _id".to_string()))
}

/// Check that every `_id` operand is a UUID.
pub(crate) fn validate_identity_values(filter: &Filter) -> Result<(), StoreError> {
    for condition in filter.conditions() {
        if let Condition::Field { path, value, .. } = condition
            && path.is_id()
        {
            for item in value.items() {
                identity_operand(item)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn identity_operand(value: &FilterValue) -> Result<Uuid, StoreError> {
    let text = value.to_text();
    Uuid::parse_str(&text).map_err(|_| StoreError::InvalidValue {
        field: ID_FIELD.to_string(),
        value: text,
    })
}
