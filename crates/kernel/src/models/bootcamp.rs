//! Bootcamp model and persistence.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{ModelResult, ValidationErrors, clean, decode, encode, is_valid_email, load};
use crate::query::{Condition, FieldPath, Filter, GeoPoint};
use crate::store::{Collection, DocumentStore, FindOptions, StoreError, field_filter};

/// Photo assigned until one is uploaded.
pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

const MAX_NAME: usize = 50;
const MAX_DESCRIPTION: usize = 500;
const MAX_PHONE: usize = 20;
const MAX_SLUG: usize = 128;

/// Fields maintained from related courses and reviews.
const DERIVED_FIELDS: [&str; 2] = ["averageCost", "averageRating"];

/// Optional writable fields, cleared when unset.
const OPTIONAL_FIELDS: [&str; 4] = ["website", "phone", "email", "location"];

/// Career tracks a bootcamp can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Career {
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Mobile Development")]
    MobileDevelopment,
    #[serde(rename = "UI/UX")]
    UiUx,
    #[serde(rename = "Data Science")]
    DataScience,
    Business,
    Other,
}

impl Career {
    pub const ALL: [Career; 6] = [
        Career::WebDevelopment,
        Career::MobileDevelopment,
        Career::UiUx,
        Career::DataScience,
        Career::Business,
        Career::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Career::WebDevelopment => "Web Development",
            Career::MobileDevelopment => "Mobile Development",
            Career::UiUx => "UI/UX",
            Career::DataScience => "Data Science",
            Career::Business => "Business",
            Career::Other => "Other",
        }
    }
}

impl fmt::Display for Career {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Career {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Career::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("'{s}' is not a valid career"))
    }
}

/// GeoJSON point with the address it was resolved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl GeoLocation {
    pub fn point(lng: f64, lat: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [lng, lat],
            formatted_address: None,
            street: None,
            city: None,
            state: None,
            zipcode: None,
            country: None,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lng: self.coordinates[0],
            lat: self.coordinates[1],
        }
    }
}

/// Bootcamp record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootcamp {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub careers: Vec<Career>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<u64>,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub housing: bool,
    #[serde(default)]
    pub job_assistance: bool,
    #[serde(default)]
    pub job_guarantee: bool,
    #[serde(default)]
    pub accept_gi: bool,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    pub user: Uuid,
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

/// Writable bootcamp fields. Absent fields are left unchanged on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootcampInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Resolved into `location`; never stored.
    pub address: Option<String>,
    pub careers: Option<Vec<String>>,
    pub housing: Option<bool>,
    pub job_assistance: Option<bool>,
    pub job_guarantee: Option<bool>,
    pub accept_gi: Option<bool>,
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG);
    slug.trim_end_matches('-').to_string()
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

impl Bootcamp {
    /// Empty record owned by `user`, filled in by [`Bootcamp::apply`].
    fn blank(user: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            website: None,
            phone: None,
            email: None,
            location: None,
            careers: Vec::new(),
            average_rating: None,
            average_cost: None,
            photo: default_photo(),
            housing: false,
            job_assistance: false,
            job_guarantee: false,
            accept_gi: false,
            created_at: super::now(),
            user,
        }
    }

    /// Copy the fields present in `input`, recording bad careers.
    fn apply(&mut self, input: BootcampInput, errors: &mut ValidationErrors) {
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
            self.slug = slugify(&self.name);
        }
        if let Some(description) = input.description {
            self.description = description.trim().to_string();
        }
        if input.website.is_some() {
            self.website = clean(input.website);
        }
        if input.phone.is_some() {
            self.phone = clean(input.phone);
        }
        if input.email.is_some() {
            self.email = clean(input.email);
        }
        if let Some(careers) = input.careers {
            self.careers = careers
                .iter()
                .filter_map(|c| c.parse().map_err(|e: String| errors.add(e)).ok())
                .collect();
        }
        if let Some(v) = input.housing {
            self.housing = v;
        }
        if let Some(v) = input.job_assistance {
            self.job_assistance = v;
        }
        if let Some(v) = input.job_guarantee {
            self.job_guarantee = v;
        }
        if let Some(v) = input.accept_gi {
            self.accept_gi = v;
        }
    }

    /// Check field constraints, adding to `errors`.
    pub fn validate(&self, errors: &mut ValidationErrors) {
        if self.name.is_empty() {
            errors.add("Please add a name");
        }
        errors.check(
            self.name.chars().count() > MAX_NAME,
            "Name can not be more than 50 characters",
        );
        if self.description.is_empty() {
            errors.add("Please add a description");
        }
        errors.check(
            self.description.chars().count() > MAX_DESCRIPTION,
            "Description can not be more than 500 characters",
        );
        errors.check(
            self.website.as_deref().is_some_and(|w| !is_web_url(w)),
            "Please use a valid URL with HTTP or HTTPS",
        );
        errors.check(
            self.phone
                .as_deref()
                .is_some_and(|p| p.chars().count() > MAX_PHONE),
            "Phone number can not be longer than 20 characters",
        );
        errors.check(
            self.email.as_deref().is_some_and(|e| !is_valid_email(e)),
            "Please add a valid email",
        );
        errors.check(self.careers.is_empty(), "Please add at least one career");
        errors.check(
            self.average_rating.is_some_and(|r| !(1.0..=10.0).contains(&r)),
            "Rating must be between 1 and 10",
        );
    }

    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Self>, StoreError> {
        load(store, Collection::Bootcamps, id).await
    }

    /// The bootcamp published by `user`, if any.
    pub async fn find_by_owner(
        store: &dyn DocumentStore,
        user: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        store
            .find_one(Collection::Bootcamps, &field_filter("user", user.to_string()))
            .await?
            .map(decode)
            .transpose()
    }

    /// Create a bootcamp owned by `user`. `location` is the geocoded
    /// address, when geocoding is available.
    pub async fn create(
        store: &dyn DocumentStore,
        user: Uuid,
        input: BootcampInput,
        location: Option<GeoLocation>,
    ) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        errors.check(
            clean(input.address.clone()).is_none(),
            "Please add an address",
        );

        let mut bootcamp = Self::blank(user);
        bootcamp.apply(input, &mut errors);
        bootcamp.location = location;
        bootcamp.validate(&mut errors);
        errors.into_result()?;

        store
            .insert(Collection::Bootcamps, encode(&bootcamp)?)
            .await?;
        tracing::info!(id = %bootcamp.id, name = %bootcamp.name, "bootcamp created");
        Ok(bootcamp)
    }

    /// Apply `input` and save. A new `location` replaces the old one.
    pub async fn update(
        mut self,
        store: &dyn DocumentStore,
        input: BootcampInput,
        location: Option<GeoLocation>,
    ) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        self.apply(input, &mut errors);
        if location.is_some() {
            self.location = location;
        }
        self.validate(&mut errors);
        errors.into_result()?;

        Ok(self.save(store).await?)
    }

    /// Write the user-editable fields, leaving the derived averages as
    /// stored, and return the bootcamp as it now reads.
    async fn save(self, store: &dyn DocumentStore) -> Result<Self, StoreError> {
        let Value::Object(mut fields) = encode(&self)? else {
            return Err(StoreError::Corrupt("bootcamp is not an object".to_string()));
        };
        fields.remove("_id");
        for field in DERIVED_FIELDS {
            fields.remove(field);
        }
        for field in OPTIONAL_FIELDS {
            fields.entry(field).or_insert(Value::Null);
        }
        store
            .update_fields(Collection::Bootcamps, self.id, fields)
            .await?;
        Ok(Self::find_by_id(store, self.id).await?.unwrap_or(self))
    }

    /// Record an uploaded photo.
    pub async fn set_photo(mut self, store: &dyn DocumentStore, photo: String) -> Result<Self, StoreError> {
        self.photo = photo;
        self.save(store).await
    }

    /// Delete a bootcamp with its courses and reviews.
    pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        let owned = field_filter("bootcamp", id.to_string());
        let courses = store.delete_many(Collection::Courses, &owned).await?;
        let reviews = store.delete_many(Collection::Reviews, &owned).await?;
        let deleted = store.delete(Collection::Bootcamps, id).await?;
        tracing::info!(%id, courses, reviews, "bootcamp deleted");
        Ok(deleted)
    }

    /// Recompute `averageCost` from the bootcamp's courses: the mean
    /// tuition rounded up to a multiple of ten.
    pub async fn refresh_average_cost(store: &dyn DocumentStore, id: Uuid) -> Result<(), StoreError> {
        let tuitions = related_numbers(store, Collection::Courses, id, "tuition").await?;
        let cost = mean(&tuitions).map(|m| ((m / 10.0).ceil() * 10.0) as u64);
        set_derived(store, id, "averageCost", cost.map(Value::from)).await
    }

    /// Recompute `averageRating` from the bootcamp's reviews.
    pub async fn refresh_average_rating(
        store: &dyn DocumentStore,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let ratings = related_numbers(store, Collection::Reviews, id, "rating").await?;
        set_derived(store, id, "averageRating", mean(&ratings).map(Value::from)).await
    }
}

/// Patch one derived field; a missing bootcamp is left alone.
async fn set_derived(
    store: &dyn DocumentStore,
    id: Uuid,
    field: &str,
    value: Option<Value>,
) -> Result<(), StoreError> {
    let mut fields = Map::new();
    fields.insert(field.to_string(), value.unwrap_or(Value::Null));
    if !store.update_fields(Collection::Bootcamps, id, fields).await? {
        tracing::debug!(%id, field, "bootcamp gone before refresh");
    }
    Ok(())
}

/// Filter for bootcamps located within `radius` radians of `center`.
pub fn within_radius(center: GeoPoint, radius: f64) -> Filter {
    Filter::new().and(Condition::WithinRadius {
        path: FieldPath::known("location"),
        center,
        radius,
    })
}

async fn related_numbers(
    store: &dyn DocumentStore,
    collection: Collection,
    bootcamp: Uuid,
    field: &str,
) -> Result<Vec<f64>, StoreError> {
    let docs = store
        .find(
            collection,
            &field_filter("bootcamp", bootcamp.to_string()),
            &FindOptions::default(),
        )
        .await?;
    Ok(docs
        .iter()
        .filter_map(|d| d.get(field).and_then(Value::as_f64))
        .collect())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ModelError;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn input() -> BootcampInput {
        serde_json::from_value(json!({
            "name": "Devworks Bootcamp",
            "description": "Full stack web development",
            "website": "https://devworks.com",
            "phone": "(111) 111-1111",
            "email": "enroll@devworks.com",
            "address": "233 Bay State Rd Boston MA 02215",
            "careers": ["Web Development", "UI/UX", "Business"],
            "housing": true,
            "jobAssistance": true
        }))
        .unwrap()
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Devworks Bootcamp"), "devworks-bootcamp");
        assert_eq!(slugify("  ModernTech -- Bootcamp! "), "moderntech-bootcamp");
        assert_eq!(slugify("UI/UX"), "ui-ux");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn careers_parse_by_display_name() {
        assert_eq!("UI/UX".parse::<Career>(), Ok(Career::UiUx));
        assert!("Cooking".parse::<Career>().is_err());
    }

    #[tokio::test]
    async fn create_fills_derived_fields() {
        let store = MemoryDocumentStore::new();
        let owner = Uuid::now_v7();
        let bootcamp = Bootcamp::create(&store, owner, input(), Some(GeoLocation::point(-71.1, 42.35)))
            .await
            .unwrap();

        assert_eq!(bootcamp.slug, "devworks-bootcamp");
        assert_eq!(bootcamp.photo, DEFAULT_PHOTO);
        assert!(!bootcamp.accept_gi);

        let stored = store
            .find_by_id(Collection::Bootcamps, bootcamp.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["location"]["coordinates"], json!([-71.1, 42.35]));
        assert!(stored.get("address").is_none());
        assert_eq!(stored["user"], owner.to_string());
    }

    #[tokio::test]
    async fn create_reports_every_violation() {
        let store = MemoryDocumentStore::new();
        let bad = BootcampInput {
            name: Some("x".repeat(51)),
            website: Some("ftp://devworks.com".into()),
            careers: Some(vec!["Cooking".into()]),
            ..Default::default()
        };
        let err = Bootcamp::create(&store, Uuid::now_v7(), bad, None)
            .await
            .unwrap_err();
        let ModelError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        let text = errors.to_string();
        assert!(text.contains("Please add an address"));
        assert!(text.contains("Name can not be more than 50 characters"));
        assert!(text.contains("Please add a description"));
        assert!(text.contains("Please use a valid URL with HTTP or HTTPS"));
        assert!(text.contains("'Cooking' is not a valid career"));
    }

    #[tokio::test]
    async fn names_are_unique() {
        let store = MemoryDocumentStore::new();
        Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        let err = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Store(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn update_renames_and_reslugs() {
        let store = MemoryDocumentStore::new();
        let bootcamp = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        let updated = bootcamp
            .update(
                &store,
                BootcampInput {
                    name: Some("Codemasters".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "codemasters");
        assert_eq!(updated.description, "Full stack web development");
    }

    #[tokio::test]
    async fn averages_follow_related_records() {
        let store = MemoryDocumentStore::new();
        let bootcamp = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        for tuition in [8000, 10001] {
            store
                .insert(
                    Collection::Courses,
                    json!({ "_id": Uuid::now_v7().to_string(), "bootcamp": bootcamp.id.to_string(), "tuition": tuition }),
                )
                .await
                .unwrap();
        }
        Bootcamp::refresh_average_cost(&store, bootcamp.id).await.unwrap();
        let found = Bootcamp::find_by_id(&store, bootcamp.id).await.unwrap().unwrap();
        assert_eq!(found.average_cost, Some(9010));

        store
            .delete_many(Collection::Courses, &Filter::new())
            .await
            .unwrap();
        Bootcamp::refresh_average_cost(&store, bootcamp.id).await.unwrap();
        let found = Bootcamp::find_by_id(&store, bootcamp.id).await.unwrap().unwrap();
        assert_eq!(found.average_cost, None);
    }

    #[tokio::test]
    async fn stale_update_keeps_refreshed_average_cost() {
        let store = MemoryDocumentStore::new();
        let owner = Uuid::now_v7();
        let created = Bootcamp::create(&store, owner, input(), None).await.unwrap();
        let loaded = Bootcamp::find_by_id(&store, created.id).await.unwrap().unwrap();

        crate::models::Course::create(
            &store,
            created.id,
            owner,
            crate::models::CourseInput {
                title: Some("Full Stack".into()),
                description: Some("Node and React".into()),
                weeks: Some(12),
                tuition: Some(10000),
                minimum_skill: Some("beginner".into()),
                scholarship_available: None,
            },
        )
        .await
        .unwrap();

        let updated = loaded
            .update(
                &store,
                BootcampInput {
                    phone: Some("222".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("222"));
        assert_eq!(updated.average_cost, Some(10000));

        let found = Bootcamp::find_by_id(&store, created.id).await.unwrap().unwrap();
        assert_eq!(found.average_cost, Some(10000));
        assert_eq!(found.phone.as_deref(), Some("222"));
    }

    #[tokio::test]
    async fn stale_photo_keeps_refreshed_average_rating() {
        let store = MemoryDocumentStore::new();
        let created = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        let loaded = Bootcamp::find_by_id(&store, created.id).await.unwrap().unwrap();

        crate::models::Review::create(
            &store,
            created.id,
            Uuid::now_v7(),
            crate::models::ReviewInput {
                title: Some("Great".into()),
                text: Some("Learned a lot".into()),
                rating: Some(8),
            },
        )
        .await
        .unwrap();

        let updated = loaded
            .set_photo(&store, "photo_new.png".into())
            .await
            .unwrap();
        assert_eq!(updated.photo, "photo_new.png");
        assert_eq!(updated.average_rating, Some(8.0));
    }

    #[tokio::test]
    async fn update_clears_unset_optional_fields() {
        let store = MemoryDocumentStore::new();
        let created = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        let updated = created
            .update(
                &store,
                BootcampInput {
                    website: Some("  ".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.website, None);

        let stored = store
            .find_by_id(Collection::Bootcamps, updated.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.get("website").is_none());
        assert_eq!(stored["phone"], "(111) 111-1111");
    }

    #[tokio::test]
    async fn refresh_ignores_missing_bootcamp() {
        let store = MemoryDocumentStore::new();
        let id = Uuid::now_v7();
        Bootcamp::refresh_average_cost(&store, id).await.unwrap();
        Bootcamp::refresh_average_rating(&store, id).await.unwrap();
        assert_eq!(
            store.count(Collection::Bootcamps, &Filter::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn delete_cascades() {
        let store = MemoryDocumentStore::new();
        let bootcamp = Bootcamp::create(&store, Uuid::now_v7(), input(), None)
            .await
            .unwrap();
        let child = json!({ "_id": Uuid::now_v7().to_string(), "bootcamp": bootcamp.id.to_string() });
        store.insert(Collection::Courses, child.clone()).await.unwrap();

        assert!(Bootcamp::delete(&store, bootcamp.id).await.unwrap());
        assert_eq!(
            store.count(Collection::Courses, &Filter::new()).await.unwrap(),
            0
        );
        assert!(!Bootcamp::delete(&store, bootcamp.id).await.unwrap());
    }
}
