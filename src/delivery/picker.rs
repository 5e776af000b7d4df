//! Address acquisition for checkout.
//!
//! Turns search selections, map picks and GPS fixes into a validated
//! [`CustomerLocation`]. Out-of-zone candidates never replace the current
//! location; they only leave a warning behind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::geo::Coordinate;
use super::geofence::{CustomerLocation, GpsError, LocationRejection, PositionFix, evaluate_candidate};
use super::search::{DebouncedSearch, SearchUpdate};
use crate::services::geocoding::{GeocodeCandidate, Geocoder};

/// One-shot device position.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self) -> Result<PositionFix, GpsError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Accepted(CustomerLocation),
    Rejected(LocationRejection),
    GpsFailed(GpsError),
}

/// Label for a coordinate, falling back to the raw coordinate when the
/// geocoder cannot help.
pub async fn resolve_label(geocoder: &dyn Geocoder, coordinate: Coordinate) -> String {
    match geocoder.reverse(coordinate).await {
        Ok(label) => label,
        Err(e) => {
            tracing::warn!(error = %e, "Reverse geocoding failed, using raw coordinate");
            coordinate.label()
        }
    }
}

pub struct AddressPicker {
    geocoder: Arc<dyn Geocoder>,
    search: DebouncedSearch,
    store: Coordinate,
    max_radius_km: f64,
    location: Option<CustomerLocation>,
    warning: Option<String>,
    gps_error: Option<GpsError>,
}

impl AddressPicker {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        store: Coordinate,
        max_radius_km: f64,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchUpdate>) {
        let (search, updates) = DebouncedSearch::new(geocoder.clone(), debounce);
        let picker = Self {
            geocoder,
            search,
            store,
            max_radius_km,
            location: None,
            warning: None,
            gps_error: None,
        };
        (picker, updates)
    }

    pub fn location(&self) -> Option<&CustomerLocation> {
        self.location.as_ref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn gps_error(&self) -> Option<GpsError> {
        self.gps_error
    }

    pub fn type_query(&mut self, text: &str) {
        self.warning = None;
        self.search.input(text);
    }

    pub async fn select_suggestion(&mut self, candidate: GeocodeCandidate) -> PickOutcome {
        self.search.cancel();
        self.accept(candidate.coordinate, Some(candidate.label)).await
    }

    pub async fn pick_on_map(&mut self, coordinate: Coordinate) -> PickOutcome {
        self.accept(coordinate, None).await
    }

    pub async fn use_current_location(&mut self, provider: &dyn PositionProvider) -> PickOutcome {
        match provider.current_position().await {
            Ok(fix) => {
                self.gps_error = None;
                self.accept(fix.coordinate, None).await
            }
            Err(e) => {
                tracing::debug!(error = ?e, "GPS fix failed");
                self.gps_error = Some(e);
                PickOutcome::GpsFailed(e)
            }
        }
    }

    /// The customer abandoned the chosen address.
    pub fn clear(&mut self) {
        self.search.cancel();
        self.location = None;
        self.warning = None;
        self.gps_error = None;
    }

    async fn accept(&mut self, coordinate: Coordinate, label: Option<String>) -> PickOutcome {
        let accepted = match evaluate_candidate(self.store, coordinate, self.max_radius_km) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                self.warning = Some(rejection.to_string());
                return PickOutcome::Rejected(rejection);
            }
        };

        let address = match label {
            Some(label) => label,
            None => resolve_label(self.geocoder.as_ref(), accepted.coordinate).await,
        };

        let location = CustomerLocation {
            coordinate: accepted.coordinate,
            address,
        };
        self.warning = None;
        self.location = Some(location.clone());
        PickOutcome::Accepted(location)
    }
}
