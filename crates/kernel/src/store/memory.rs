//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::matcher::{compare_documents, json_eq, matches};
use super::{
    Collection, DocumentStore, FindOptions, StoreError, document_id, validate_identity_values,
};
use crate::query::Filter;

/// Document store held in memory. Documents keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether `doc` collides with `other` on any unique key of `collection`.
fn violates_unique(collection: Collection, doc: &Value, other: &Value) -> bool {
    collection.unique_keys().iter().any(|fields| {
        fields.iter().all(|field| match (doc.get(*field), other.get(*field)) {
            (Some(a), Some(b)) if !a.is_null() && !b.is_null() => json_eq(a, b),
            _ => false,
        })
    })
}

fn check_unique(
    collection: Collection,
    docs: &[Value],
    id: Uuid,
    doc: &Value,
) -> Result<(), StoreError> {
    let conflict = docs.iter().any(|other| {
        document_id(other).is_ok_and(|other_id| other_id != id)
            && violates_unique(collection, doc, other)
    });
    if conflict {
        Err(StoreError::Duplicate)
    } else {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        validate_identity_values(filter)?;
        let guard = self.collections.read();
        let count = guard
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        validate_identity_values(filter)?;
        let mut found: Vec<Value> = {
            let guard = self.collections.read();
            guard
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|d| matches(d, filter))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        found.sort_by(|a, b| compare_documents(a, b, &options.sort));

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let take = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(skip).take(take).collect())
    }

    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), StoreError> {
        let id = document_id(&doc)?;
        let mut guard = self.collections.write();
        let docs = guard.entry(collection).or_default();
        if docs.iter().any(|d| document_id(d).is_ok_and(|d| d == id)) {
            return Err(StoreError::Duplicate);
        }
        check_unique(collection, docs, id, &doc)?;
        docs.push(doc);
        Ok(())
    }

    async fn replace(&self, collection: Collection, doc: Value) -> Result<bool, StoreError> {
        let id = document_id(&doc)?;
        let mut guard = self.collections.write();
        let docs = guard.entry(collection).or_default();
        check_unique(collection, docs, id, &doc)?;
        match docs
            .iter_mut()
            .find(|d| document_id(d).is_ok_and(|d| d == id))
        {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write();
        let docs = guard.entry(collection).or_default();
        let Some(current) = docs
            .iter()
            .find(|d| document_id(d).is_ok_and(|d| d == id))
        else {
            return Ok(false);
        };

        let mut patched = current.clone();
        if let Some(body) = patched.as_object_mut() {
            for (key, value) in fields {
                if value.is_null() {
                    body.remove(&key);
                } else {
                    body.insert(key, value);
                }
            }
        }
        check_unique(collection, docs, id, &patched)?;
        if let Some(slot) = docs
            .iter_mut()
            .find(|d| document_id(d).is_ok_and(|d| d == id))
        {
            *slot = patched;
        }
        Ok(true)
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| !document_id(d).is_ok_and(|d| d == id));
        Ok(docs.len() != before)
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        validate_identity_values(filter)?;
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches(d, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::{FieldPath, SortDirection, SortKey};
    use crate::store::{field_filter, id_filter};
    use serde_json::json;

    fn doc(name: &str, cost: i64) -> Value {
        json!({ "_id": Uuid::now_v7().to_string(), "name": name, "averageCost": cost })
    }

    #[tokio::test]
    async fn insert_find_and_count() {
        let store = MemoryDocumentStore::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            store
                .insert(Collection::Bootcamps, doc(name, i as i64 * 100))
                .await
                .unwrap();
        }

        let all = Filter::new();
        assert_eq!(store.count(Collection::Bootcamps, &all).await.unwrap(), 3);
        assert_eq!(store.count(Collection::Courses, &all).await.unwrap(), 0);

        let options = FindOptions {
            sort: vec![SortKey {
                path: FieldPath::parse("averageCost").unwrap(),
                direction: SortDirection::Desc,
            }],
            skip: 1,
            limit: Some(1),
        };
        let page = store
            .find(Collection::Bootcamps, &all, &options)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["name"], "b");
    }

    #[tokio::test]
    async fn unique_keys_are_enforced() {
        let store = MemoryDocumentStore::new();
        store
            .insert(Collection::Bootcamps, doc("Devworks", 1))
            .await
            .unwrap();
        let err = store
            .insert(Collection::Bootcamps, doc("Devworks", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        // Courses have no unique keys.
        store
            .insert(Collection::Courses, doc("Devworks", 1))
            .await
            .unwrap();
        store
            .insert(Collection::Courses, doc("Devworks", 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replace_checks_other_documents_only() {
        let store = MemoryDocumentStore::new();
        let first = doc("first", 1);
        let second = doc("second", 2);
        store
            .insert(Collection::Bootcamps, first.clone())
            .await
            .unwrap();
        store
            .insert(Collection::Bootcamps, second.clone())
            .await
            .unwrap();

        let mut renamed = first.clone();
        renamed["averageCost"] = json!(50);
        assert!(
            store
                .replace(Collection::Bootcamps, renamed)
                .await
                .unwrap()
        );

        let mut clash = first.clone();
        clash["name"] = json!("second");
        assert!(matches!(
            store.replace(Collection::Bootcamps, clash).await,
            Err(StoreError::Duplicate)
        ));

        let id = document_id(&first).unwrap();
        let stored = store
            .find_by_id(Collection::Bootcamps, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["averageCost"], 50);
    }

    #[tokio::test]
    async fn update_fields_patches_in_place() {
        let store = MemoryDocumentStore::new();
        let first = doc("first", 1);
        let id = document_id(&first).unwrap();
        store
            .insert(Collection::Bootcamps, first.clone())
            .await
            .unwrap();
        store
            .insert(Collection::Bootcamps, doc("second", 2))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("averageCost".into(), Value::Null);
        fields.insert("phone".into(), json!("222"));
        assert!(
            store
                .update_fields(Collection::Bootcamps, id, fields)
                .await
                .unwrap()
        );
        let stored = store
            .find_by_id(Collection::Bootcamps, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["phone"], "222");
        assert_eq!(stored["name"], "first");
        assert!(stored.get("averageCost").is_none());

        let mut clash = Map::new();
        clash.insert("name".into(), json!("second"));
        assert!(matches!(
            store.update_fields(Collection::Bootcamps, id, clash).await,
            Err(StoreError::Duplicate)
        ));

        let mut fields = Map::new();
        fields.insert("phone".into(), json!("333"));
        assert!(
            !store
                .update_fields(Collection::Bootcamps, Uuid::now_v7(), fields)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn delete_and_delete_many() {
        let store = MemoryDocumentStore::new();
        let keep = doc("keep", 1);
        store
            .insert(Collection::Courses, keep.clone())
            .await
            .unwrap();
        store
            .insert(Collection::Courses, doc("drop", 2))
            .await
            .unwrap();
        store
            .insert(Collection::Courses, doc("drop", 3))
            .await
            .unwrap();

        let removed = store
            .delete_many(Collection::Courses, &field_filter("name", "drop"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let id = document_id(&keep).unwrap();
        assert!(store.delete(Collection::Courses, id).await.unwrap());
        assert!(!store.delete(Collection::Courses, id).await.unwrap());
        assert!(
            store
                .find_one(Collection::Courses, &id_filter(id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_identity_is_rejected() {
        let store = MemoryDocumentStore::new();
        let params = vec![("_id".to_string(), "nope".to_string())];
        let filter = crate::query::translate(&params).unwrap();
        assert!(matches!(
            store.count(Collection::Bootcamps, &filter).await,
            Err(StoreError::InvalidValue { .. })
        ));
    }
}
