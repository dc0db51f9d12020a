//! Bulk import and removal of sample data.
//!
//! Import reads `users.json`, `bootcamps.json`, `courses.json` and
//! `reviews.json` from a directory (any subset may be present). Each file
//! holds an array of records whose `_id`, `user` and `bootcamp` fields may
//! use any identifier scheme; they are remapped to fresh document ids,
//! consistently across files. Records go through the model constructors,
//! so passwords are hashed and derived fields computed.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    Bootcamp, BootcampInput, Course, CourseInput, Review, ReviewInput, User, UserInput,
};
use crate::query::Filter;
use crate::services::geocoder::Geocoder;
use crate::store::{Collection, DocumentStore};

/// Records created by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub bootcamps: usize,
    pub courses: usize,
    pub reviews: usize,
}

/// Old identifiers to new document ids.
#[derive(Debug, Default)]
struct IdMap(HashMap<String, Uuid>);

impl IdMap {
    /// The new id for `old`, minting one on first sight.
    fn resolve(&mut self, old: &str) -> Uuid {
        *self.0.entry(old.to_string()).or_insert_with(Uuid::now_v7)
    }

    /// Id for a record's own `_id`, or a fresh one when it has none.
    fn own_id(&mut self, record: &Value) -> Uuid {
        match record.get("_id").and_then(Value::as_str) {
            Some(old) => self.resolve(old),
            None => Uuid::now_v7(),
        }
    }

    fn reference(&mut self, record: &Value, field: &str, kind: &str) -> Result<Uuid> {
        let Some(old) = record.get(field).and_then(Value::as_str) else {
            bail!("{kind} record has no '{field}' reference");
        };
        Ok(self.resolve(old))
    }
}

/// Records of `file` in `dir`, or nothing when the file is absent.
async fn read_records(dir: &Path, file: &str) -> Result<Vec<Value>> {
    let path = dir.join(file);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not a JSON array", path.display()))
}

fn input<T: DeserializeOwned>(record: &Value, file: &str) -> Result<T> {
    serde_json::from_value(record.clone()).with_context(|| format!("malformed record in {file}"))
}

/// The created record carries a fresh id; move it to the mapped one so
/// later files can reference it.
async fn rekey(
    store: &dyn DocumentStore,
    collection: Collection,
    mut doc: Value,
    from: Uuid,
    to: Uuid,
) -> Result<()> {
    if let Value::Object(map) = &mut doc {
        map.insert("_id".to_string(), Value::String(to.to_string()));
    }
    store.delete(collection, from).await?;
    store.insert(collection, doc).await?;
    Ok(())
}

/// Import every seed file found in `dir`.
pub async fn import(
    store: &dyn DocumentStore,
    geocoder: Option<&dyn Geocoder>,
    dir: &Path,
) -> Result<SeedReport> {
    let mut ids = IdMap::default();
    let mut report = SeedReport::default();

    for record in read_records(dir, "users.json").await? {
        let id = ids.own_id(&record);
        let fields: UserInput = input(&record, "users.json")?;
        let user = User::create(store, fields)
            .await
            .with_context(|| format!("failed to import user {record}"))?;
        rekey(store, Collection::Users, user.to_document()?, user.id, id).await?;
        report.users += 1;
    }

    for record in read_records(dir, "bootcamps.json").await? {
        let id = ids.own_id(&record);
        let owner = ids.reference(&record, "user", "bootcamp")?;
        let fields: BootcampInput = input(&record, "bootcamps.json")?;
        let location = match (geocoder, fields.address.as_deref()) {
            (Some(geocoder), Some(address)) => geocoder.geocode(address).await?,
            _ => None,
        };
        let bootcamp = Bootcamp::create(store, owner, fields, location)
            .await
            .with_context(|| format!("failed to import bootcamp {record}"))?;
        let doc = serde_json::to_value(&bootcamp)?;
        rekey(store, Collection::Bootcamps, doc, bootcamp.id, id).await?;
        report.bootcamps += 1;
    }

    for record in read_records(dir, "courses.json").await? {
        let id = ids.own_id(&record);
        let bootcamp = ids.reference(&record, "bootcamp", "course")?;
        let user = ids.reference(&record, "user", "course")?;
        let fields: CourseInput = input(&record, "courses.json")?;
        let course = Course::create(store, bootcamp, user, fields)
            .await
            .with_context(|| format!("failed to import course {record}"))?;
        let doc = serde_json::to_value(&course)?;
        rekey(store, Collection::Courses, doc, course.id, id).await?;
        report.courses += 1;
    }

    for record in read_records(dir, "reviews.json").await? {
        let id = ids.own_id(&record);
        let bootcamp = ids.reference(&record, "bootcamp", "review")?;
        let user = ids.reference(&record, "user", "review")?;
        let fields: ReviewInput = input(&record, "reviews.json")?;
        let review = Review::create(store, bootcamp, user, fields)
            .await
            .with_context(|| format!("failed to import review {record}"))?;
        let doc = serde_json::to_value(&review)?;
        rekey(store, Collection::Reviews, doc, review.id, id).await?;
        report.reviews += 1;
    }

    info!(
        users = report.users,
        bootcamps = report.bootcamps,
        courses = report.courses,
        reviews = report.reviews,
        "seed data imported"
    );
    Ok(report)
}

/// Delete every document in every collection.
pub async fn destroy(store: &dyn DocumentStore) -> Result<u64> {
    let mut removed = 0;
    for collection in Collection::ALL {
        removed += store.delete_many(collection, &Filter::new()).await?;
    }
    info!(removed, "seed data destroyed");
    Ok(removed)
}
