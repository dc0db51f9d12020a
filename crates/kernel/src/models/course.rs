//! Course model. Every write refreshes the parent bootcamp's average cost.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Bootcamp, ModelResult, ValidationErrors, decode, encode, load};
use crate::store::{Collection, DocumentStore, FindOptions, StoreError, field_filter};

/// Skill expected before enrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinimumSkill {
    Beginner,
    Intermediate,
    Advanced,
}

impl MinimumSkill {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinimumSkill::Beginner => "beginner",
            MinimumSkill::Intermediate => "intermediate",
            MinimumSkill::Advanced => "advanced",
        }
    }
}

impl fmt::Display for MinimumSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinimumSkill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(MinimumSkill::Beginner),
            "intermediate" => Ok(MinimumSkill::Intermediate),
            "advanced" => Ok(MinimumSkill::Advanced),
            other => Err(format!("'{other}' is not a valid minimum skill")),
        }
    }
}

/// Course record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub weeks: u32,
    pub tuition: u64,
    pub minimum_skill: MinimumSkill,
    #[serde(default)]
    pub scholarship_available: bool,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    pub bootcamp: Uuid,
    pub user: Uuid,
}

/// Writable course fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weeks: Option<u32>,
    pub tuition: Option<u64>,
    pub minimum_skill: Option<String>,
    pub scholarship_available: Option<bool>,
}

impl Course {
    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Self>, StoreError> {
        load(store, Collection::Courses, id).await
    }

    /// All courses of one bootcamp, oldest first.
    pub async fn for_bootcamp(
        store: &dyn DocumentStore,
        bootcamp: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        store
            .find(
                Collection::Courses,
                &field_filter("bootcamp", bootcamp.to_string()),
                &FindOptions::default(),
            )
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Add a course to `bootcamp` on behalf of `user`.
    pub async fn create(
        store: &dyn DocumentStore,
        bootcamp: Uuid,
        user: Uuid,
        input: CourseInput,
    ) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        let title = input.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        errors.check(title.is_empty(), "Please add a course title");
        errors.check(description.is_empty(), "Please add a description");
        errors.check(input.weeks.is_none(), "Please add number of weeks");
        errors.check(input.tuition.is_none(), "Please add a tuition cost");
        let minimum_skill = match input.minimum_skill.as_deref().map(str::parse::<MinimumSkill>) {
            Some(Ok(skill)) => Some(skill),
            Some(Err(e)) => {
                errors.add(e);
                None
            }
            None => {
                errors.add("Please add a minimum skill");
                None
            }
        };
        errors.check(input.weeks == Some(0), "Weeks must be at least 1");

        let (Some(weeks), Some(tuition), Some(minimum_skill)) =
            (input.weeks, input.tuition, minimum_skill)
        else {
            return Err(errors.into());
        };
        errors.into_result()?;

        let course = Self {
            id: Uuid::now_v7(),
            title,
            description,
            weeks,
            tuition,
            minimum_skill,
            scholarship_available: input.scholarship_available.unwrap_or(false),
            created_at: super::now(),
            bootcamp,
            user,
        };
        store.insert(Collection::Courses, encode(&course)?).await?;
        Bootcamp::refresh_average_cost(store, bootcamp).await?;
        Ok(course)
    }

    /// Apply the fields present in `input` and save.
    pub async fn update(mut self, store: &dyn DocumentStore, input: CourseInput) -> ModelResult<Self> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
            errors.check(self.title.is_empty(), "Please add a course title");
        }
        if let Some(description) = input.description {
            self.description = description.trim().to_string();
            errors.check(self.description.is_empty(), "Please add a description");
        }
        if let Some(weeks) = input.weeks {
            errors.check(weeks == 0, "Weeks must be at least 1");
            self.weeks = weeks;
        }
        if let Some(tuition) = input.tuition {
            self.tuition = tuition;
        }
        if let Some(skill) = input.minimum_skill {
            match skill.parse() {
                Ok(skill) => self.minimum_skill = skill,
                Err(e) => errors.add(e),
            }
        }
        if let Some(v) = input.scholarship_available {
            self.scholarship_available = v;
        }
        errors.into_result()?;

        store.replace(Collection::Courses, encode(&self)?).await?;
        Bootcamp::refresh_average_cost(store, self.bootcamp).await?;
        Ok(self)
    }

    pub async fn delete(self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        store.delete(Collection::Courses, self.id).await?;
        Bootcamp::refresh_average_cost(store, self.bootcamp).await
    }
}
