//! Review model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Bootcamp, ModelResult, ValidationErrors, decode, encode, load};
use crate::store::{Collection, DocumentStore, FindOptions, StoreError, field_filter};

const MAX_TITLE: usize = 100;

/// Review record. A user reviews a bootcamp at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub rating: u8,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    pub bootcamp: Uuid,
    pub user: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i64>,
}

fn check_rating(rating: i64, errors: &mut ValidationErrors) -> u8 {
    match u8::try_from(rating) {
        Ok(r @ 1..=10) => r,
        _ => {
            errors.add("Please add a rating between 1 and 10");
            0
        }
    }
}

impl Review {
    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Self>, StoreError> {
        load(store, Collection::Reviews, id).await
    }

    pub async fn for_bootcamp(
        store: &dyn DocumentStore,
        bootcamp: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        store
            .find(
                Collection::Reviews,
                &field_filter("bootcamp", bootcamp.to_string()),
                &FindOptions::default(),
            )
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn create(
        store: &dyn DocumentStore,
        bootcamp: Uuid,
        user: Uuid,
        input: ReviewInput,
    ) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        let title = input.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let text = input.text.map(|t| t.trim().to_string()).unwrap_or_default();
        errors.check(title.is_empty(), "Please add a title for the review");
        errors.check(
            title.chars().count() > MAX_TITLE,
            "Title can not be more than 100 characters",
        );
        errors.check(text.is_empty(), "Please add some text");
        let rating = match input.rating {
            Some(r) => check_rating(r, &mut errors),
            None => {
                errors.add("Please add a rating between 1 and 10");
                0
            }
        };
        errors.into_result()?;

        let review = Self {
            id: Uuid::now_v7(),
            title,
            text,
            rating,
            created_at: super::now(),
            bootcamp,
            user,
        };
        store.insert(Collection::Reviews, encode(&review)?).await?;
        Bootcamp::refresh_average_rating(store, bootcamp).await?;
        Ok(review)
    }

    pub async fn update(mut self, store: &dyn DocumentStore, input: ReviewInput) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
            errors.check(self.title.is_empty(), "Please add a title for the review");
            errors.check(
                self.title.chars().count() > MAX_TITLE,
                "Title can not be more than 100 characters",
            );
        }
        if let Some(text) = input.text {
            self.text = text.trim().to_string();
            errors.check(self.text.is_empty(), "Please add some text");
        }
        if let Some(rating) = input.rating {
            self.rating = check_rating(rating, &mut errors);
        }
        errors.into_result()?;

        store.replace(Collection::Reviews, encode(&self)?).await?;
        Bootcamp::refresh_average_rating(store, self.bootcamp).await?;
        Ok(self)
    }

    pub async fn delete(self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        store.delete(Collection::Reviews, self.id).await?;
        Bootcamp::refresh_average_rating(store, self.bootcamp).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{BootcampInput, ModelError};
    use crate::store::MemoryDocumentStore;

    fn input(rating: i64) -> ReviewInput {
        ReviewInput {
            title: Some("Learned a ton!".into()),
            text: Some("Great instructors".into()),
            rating: Some(rating),
        }
    }

    async fn bootcamp_id(store: &MemoryDocumentStore) -> Uuid {
        let input = BootcampInput {
            name: Some("Codemasters".into()),
            description: Some("Learn to code".into()),
            address: Some("85 South Prospect Street Burlington VT 05405".into()),
            careers: Some(vec!["Data Science".into()]),
            ..Default::default()
        };
        Bootcamp::create(store, Uuid::now_v7(), input, None)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn one_review_per_user_per_bootcamp() {
        let store = MemoryDocumentStore::new();
        let camp = bootcamp_id(&store).await;
        let user = Uuid::now_v7();
        Review::create(&store, camp, user, input(8)).await.unwrap();
        let err = Review::create(&store, camp, user, input(9)).await.unwrap_err();
        assert!(matches!(err, ModelError::Store(StoreError::Duplicate)));

        Review::create(&store, camp, Uuid::now_v7(), input(9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rating_average_tracks_reviews() {
        let store = MemoryDocumentStore::new();
        let camp = bootcamp_id(&store).await;
        let first = Review::create(&store, camp, Uuid::now_v7(), input(10)).await.unwrap();
        Review::create(&store, camp, Uuid::now_v7(), input(7)).await.unwrap();

        let rating = Bootcamp::find_by_id(&store, camp).await.unwrap().unwrap().average_rating;
        assert_eq!(rating, Some(8.5));

        first.delete(&store).await.unwrap();
        let rating = Bootcamp::find_by_id(&store, camp).await.unwrap().unwrap().average_rating;
        assert_eq!(rating, Some(7.0));
    }

    #[tokio::test]
    async fn ratings_are_bounded() {
        let store = MemoryDocumentStore::new();
        for bad in [0, 11, -3] {
            let err = Review::create(&store, Uuid::now_v7(), Uuid::now_v7(), input(bad))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Please add a rating between 1 and 10");
        }
    }
}
