//! Address geocoding.
//!
//! Bootcamp addresses and radius-search zipcodes are resolved into GeoJSON
//! points through a [`Geocoder`]. The production implementation calls the
//! MapQuest geocoding API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::models::GeoLocation;

/// Resolves free-form addresses.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `address`, or `None` when nothing matched.
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>>;
}

/// MapQuest geocoding API client.
pub struct MapQuestGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    results: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    lat_lng: LatLng,
    #[serde(default)]
    street: String,
    /// City.
    #[serde(default)]
    admin_area5: String,
    /// State.
    #[serde(default)]
    admin_area3: String,
    /// Country code.
    #[serde(default)]
    admin_area1: String,
    #[serde(default)]
    postal_code: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl Location {
    fn into_geo(self) -> GeoLocation {
        let state_zip = format!("{} {}", self.admin_area3, self.postal_code);
        let parts: [&str; 4] = [
            &self.street,
            &self.admin_area5,
            &state_zip,
            &self.admin_area1,
        ];
        let formatted = parts
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let mut geo = GeoLocation::point(self.lat_lng.lng, self.lat_lng.lat);
        geo.formatted_address = non_empty(formatted);
        geo.street = non_empty(self.street);
        geo.city = non_empty(self.admin_area5);
        geo.state = non_empty(self.admin_area3);
        geo.zipcode = non_empty(self.postal_code);
        geo.country = non_empty(self.admin_area1);
        geo
    }
}

impl MapQuestGeocoder {
    pub fn new(url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>> {
        let response: Response = self
            .client
            .get(&self.url)
            .query(&[("key", self.api_key.as_str()), ("location", address)])
            .send()
            .await
            .context("geocoder request failed")?
            .error_for_status()
            .context("geocoder returned an error status")?
            .json()
            .await
            .context("geocoder returned malformed JSON")?;

        let location = response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.locations.into_iter().next())
            .map(Location::into_geo);
        tracing::debug!(%address, found = location.is_some(), "geocoded address");
        Ok(location)
    }
}

/// MapQuest when an API key is configured.
pub fn from_config(config: &Config) -> Option<Box<dyn Geocoder>> {
    let key = config.geocoder_api_key.clone()?;
    Some(Box::new(MapQuestGeocoder::new(config.geocoder_url.clone(), key)))
}
