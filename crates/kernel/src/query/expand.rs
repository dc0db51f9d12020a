//! Relation expansion.
//!
//! Relations are declared per collection and resolved once, when a
//! pipeline is built. Expansion runs one batched `in` query per page and
//! distributes the results into the parent records.

use std::collections::HashSet;

use serde_json::Value;

use super::shape::parse_select;
use super::types::{ID_FIELD, strip_fields};
use super::{Condition, FieldPath, Filter, FilterValue, Projection, RelationError};
use crate::store::{Collection, DocumentStore, FindOptions, StoreError};

/// How parent and related records are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Related records point at the parent; attached as a list.
    HasMany,
    /// The parent points at one related record; attached as an object or null.
    BelongsTo,
}

/// A resolved relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Field the related records are attached under.
    pub name: String,
    pub target: Collection,
    pub kind: RelationKind,
    pub local_key: FieldPath,
    pub foreign_key: FieldPath,
    /// Fields kept on related records.
    pub select: Projection,
}

/// Requested expansion: a relation name, optionally with selected fields
/// (`"name description"` or `"name,description"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub path: String,
    pub select: Option<String>,
}

impl RelationSpec {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            select: None,
        }
    }

    pub fn with_select(mut self, select: &str) -> Self {
        self.select = Some(select.to_string());
        self
    }
}

struct Declared {
    collection: Collection,
    name: &'static str,
    target: Collection,
    kind: RelationKind,
    local_key: &'static str,
    foreign_key: &'static str,
}

const RELATIONS: &[Declared] = &[
    Declared {
        collection: Collection::Bootcamps,
        name: "courses",
        target: Collection::Courses,
        kind: RelationKind::HasMany,
        local_key: ID_FIELD,
        foreign_key: "bootcamp",
    },
    Declared {
        collection: Collection::Bootcamps,
        name: "reviews",
        target: Collection::Reviews,
        kind: RelationKind::HasMany,
        local_key: ID_FIELD,
        foreign_key: "bootcamp",
    },
    Declared {
        collection: Collection::Courses,
        name: "bootcamp",
        target: Collection::Bootcamps,
        kind: RelationKind::BelongsTo,
        local_key: "bootcamp",
        foreign_key: ID_FIELD,
    },
    Declared {
        collection: Collection::Courses,
        name: "user",
        target: Collection::Users,
        kind: RelationKind::BelongsTo,
        local_key: "user",
        foreign_key: ID_FIELD,
    },
    Declared {
        collection: Collection::Reviews,
        name: "bootcamp",
        target: Collection::Bootcamps,
        kind: RelationKind::BelongsTo,
        local_key: "bootcamp",
        foreign_key: ID_FIELD,
    },
    Declared {
        collection: Collection::Reviews,
        name: "user",
        target: Collection::Users,
        kind: RelationKind::BelongsTo,
        local_key: "user",
        foreign_key: ID_FIELD,
    },
];

impl Relation {
    /// Resolve a requested expansion against the declared relations.
    pub fn resolve(collection: Collection, spec: &RelationSpec) -> Result<Self, RelationError> {
        let declared = RELATIONS
            .iter()
            .find(|d| d.collection == collection && d.name == spec.path)
            .ok_or_else(|| RelationError::UnknownRelation {
                collection: collection.to_string(),
                path: spec.path.clone(),
            })?;

        let select =
            parse_select(spec.select.as_deref()).map_err(|e| RelationError::InvalidField {
                path: spec.path.clone(),
                field: match e {
                    super::QueryError::InvalidField(f) => f,
                    other => other.to_string(),
                },
            })?;

        Ok(Self {
            name: declared.name.to_string(),
            target: declared.target,
            kind: declared.kind,
            local_key: FieldPath::known(declared.local_key),
            foreign_key: FieldPath::known(declared.foreign_key),
            select,
        })
    }
}

/// Text used to match keys across collections.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_ascii_lowercase()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Attach related records to each record in `records`.
pub async fn expand(
    store: &dyn DocumentStore,
    relation: &Relation,
    records: &mut [Value],
) -> Result<(), StoreError> {
    // 1. Collect and deduplicate parent keys
    let mut seen = HashSet::new();
    let mut keys: Vec<FilterValue> = Vec::new();
    for record in records.iter() {
        if let Some(key) = relation.local_key.lookup(record).and_then(key_text)
            && seen.insert(key.clone())
        {
            keys.push(FilterValue::String(key));
        }
    }
    if relation.foreign_key.is_id() {
        keys.retain(|k| uuid::Uuid::parse_str(&k.to_text()).is_ok());
    }

    // 2. One batched query for every parent on the page
    let related = if keys.is_empty() {
        Vec::new()
    } else {
        let filter = Filter::new().and(Condition::is_in(relation.foreign_key.clone(), keys));
        store
            .find(relation.target, &filter, &FindOptions::default())
            .await?
    };

    // 3. Distribute
    for record in records.iter_mut() {
        let parent_key = relation.local_key.lookup(record).and_then(key_text);
        let mut matching = related.iter().filter(|child| {
            parent_key.is_some()
                && relation.foreign_key.lookup(child).and_then(key_text) == parent_key
        });

        let attached = match relation.kind {
            RelationKind::HasMany => Value::Array(matching.map(|c| shape(relation, c)).collect()),
            RelationKind::BelongsTo => matching
                .next()
                .map(|c| shape(relation, c))
                .unwrap_or(Value::Null),
        };

        if let Value::Object(map) = record {
            map.insert(relation.name.clone(), attached);
        }
    }

    Ok(())
}

fn shape(relation: &Relation, child: &Value) -> Value {
    let mut shaped = relation.select.apply(child);
    strip_fields(&mut shaped, relation.target.hidden_fields());
    shaped
}
