use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geo::{self, Coordinate};

/// A delivery address the customer has settled on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLocation {
    pub coordinate: Coordinate,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationRejection {
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    #[error("too far: {distance_km:.1} km; delivery zone max {max_radius_km} km.")]
    OutOfZone { distance_km: f64, max_radius_km: f64 },
}

/// Candidate that passed the zone check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedCandidate {
    pub coordinate: Coordinate,
    pub distance_km: f64,
}

/// Validate a candidate coordinate and check it against the hard delivery zone.
pub fn evaluate_candidate(
    store: Coordinate,
    candidate: Coordinate,
    max_radius_km: f64,
) -> Result<AcceptedCandidate, LocationRejection> {
    let coordinate = candidate
        .validated()
        .map_err(|e| LocationRejection::InvalidCoordinate {
            latitude: e.latitude,
            longitude: e.longitude,
        })?;

    let distance_km = geo::distance_km(store, coordinate);
    if distance_km > max_radius_km {
        tracing::debug!(distance_km, max_radius_km, "Location outside delivery zone");
        return Err(LocationRejection::OutOfZone {
            distance_km,
            max_radius_km,
        });
    }

    Ok(AcceptedCandidate {
        coordinate,
        distance_km,
    })
}

/// Device geolocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsError {
    #[error("Location access was denied. You can still enter the address manually.")]
    PermissionDenied,
    #[error("Your location is not available right now. Please enter the address manually.")]
    PositionUnavailable,
    #[error("Finding your location took too long. Please try again or enter the address manually.")]
    Timeout,
    #[error("Could not determine your location.")]
    Other,
}

impl GpsError {
    /// Map a W3C geolocation error code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Other,
        }
    }
}

/// One position reading from a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Accuracy radius in meters.
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}
