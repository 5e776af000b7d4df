use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delivery::geo::Coordinate;

#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoding service returned status {0}")]
    Status(u16),
    #[error("no address found")]
    NotFound,
}

/// One forward-geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCandidate {
    pub coordinate: Coordinate,
    pub label: String,
}

/// Forward and reverse geocoding. Implementations are network-backed, so
/// callers debounce searches.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeCandidate>, GeocodingError>;
    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

/// Client for an OpenStreetMap Nominatim instance.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    /// Appended to every search to keep results in the delivery country.
    region: String,
    limit: u8,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: &str,
        region: &str,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            region: region.to_string(),
            limit: 5,
        })
    }

    fn regional_query(&self, query: &str) -> String {
        let query = query.trim();
        if self.region.is_empty() {
            query.to_string()
        } else {
            format!("{query}, {}", self.region)
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GeocodingError> {
        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .header("Accept-Language", "sr,en")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodingError::Status(status.as_u16()));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeCandidate>, GeocodingError> {
        let places: Vec<NominatimPlace> = self
            .get(
                "search",
                &[
                    ("format", "json".to_string()),
                    ("q", self.regional_query(query)),
                    ("addressdetails", "1".to_string()),
                    ("limit", self.limit.to_string()),
                ],
            )
            .await?;

        // Nominatim sends coordinates as strings; drop anything unparsable or out of range
        let candidates = places
            .into_iter()
            .filter_map(|place| {
                let latitude = place.lat.parse().ok()?;
                let longitude = place.lon.parse().ok()?;
                let coordinate = Coordinate::new(latitude, longitude).ok()?;
                Some(GeocodeCandidate {
                    coordinate,
                    label: place.display_name,
                })
            })
            .collect();

        Ok(candidates)
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError> {
        let place: NominatimReverse = self
            .get(
                "reverse",
                &[
                    ("format", "json".to_string()),
                    ("lat", coordinate.latitude.to_string()),
                    ("lon", coordinate.longitude.to_string()),
                    ("zoom", "18".to_string()),
                ],
            )
            .await?;

        place
            .display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(GeocodingError::NotFound)
    }
}
