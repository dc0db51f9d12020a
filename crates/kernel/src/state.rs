//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::query::{ListingPipeline, RelationSpec};
use crate::services::email::{self, Mailer};
use crate::services::geocoder::{self, Geocoder};
use crate::services::photo::PhotoStore;
use crate::services::token::TokenService;
use crate::store::{Collection, DocumentStore, MemoryDocumentStore, PgDocumentStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn DocumentStore>,
    tokens: TokenService,
    /// `None` when no geocoder API key is configured.
    geocoder: Option<Box<dyn Geocoder>>,
    mailer: Box<dyn Mailer>,
    photos: PhotoStore,
    listings: Listings,
}

/// Listing pipelines, built once at startup.
pub struct Listings {
    pub bootcamps: ListingPipeline,
    pub courses: ListingPipeline,
    pub reviews: ListingPipeline,
    pub users: ListingPipeline,
}

impl Listings {
    fn new() -> Result<Self> {
        let bootcamp_summary = || RelationSpec::new("bootcamp").with_select("name description");
        Ok(Self {
            bootcamps: ListingPipeline::new(
                Collection::Bootcamps,
                Some(RelationSpec::new("courses")),
            )?,
            courses: ListingPipeline::new(Collection::Courses, Some(bootcamp_summary()))?,
            reviews: ListingPipeline::new(Collection::Reviews, Some(bootcamp_summary()))?,
            users: ListingPipeline::new(Collection::Users, None)?,
        })
    }
}

/// Open the document store named by `DATABASE_URL`, migrating PostgreSQL.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    if config.uses_memory_store() {
        info!("using in-memory document store");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    }

    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;
    info!("PostgreSQL connected and migrated");
    Ok(Arc::new(PgDocumentStore::new(pool)))
}

impl AppState {
    /// Build state from configuration, connecting to the store.
    pub async fn new(config: &Config) -> Result<Self> {
        let store = open_store(config).await?;
        let geocoder = geocoder::from_config(config);
        if geocoder.is_none() {
            info!("GEOCODER_API_KEY not set; geocoding disabled");
        }
        let mailer = email::from_config(config).context("failed to configure mailer")?;
        Self::from_parts(config.clone(), store, geocoder, mailer)
    }

    /// Build state from explicit collaborators.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        geocoder: Option<Box<dyn Geocoder>>,
        mailer: Box<dyn Mailer>,
    ) -> Result<Self> {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.jwt_expire_days);
        let photos = PhotoStore::new(&config.file_upload_path, config.max_file_upload);
        let listings = Listings::new().context("invalid listing relation")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                geocoder,
                mailer,
                photos,
                listings,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The document store.
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    pub fn geocoder(&self) -> Option<&dyn Geocoder> {
        self.inner.geocoder.as_deref()
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    pub fn photos(&self) -> &PhotoStore {
        &self.inner.photos
    }

    pub fn listings(&self) -> &Listings {
        &self.inner.listings
    }

    /// Check if the document store answers.
    pub async fn store_healthy(&self) -> bool {
        self.inner.store.ping().await
    }
}
