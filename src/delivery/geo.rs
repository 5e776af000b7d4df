use serde::{Deserialize, Serialize};
use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average courier speed used for customer-facing ETAs.
const AVERAGE_SPEED_KMH: f64 = 30.0;
const MIN_ETA_MINUTES: i64 = 15;
const ETA_BAND_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting NaN and out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Deserialized coordinates bypass `new`, so boundaries re-check with this.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validated(self) -> Result<Self, InvalidCoordinate> {
        Self::new(self.latitude, self.longitude)
    }

    pub fn label(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Check if a point is within `max_radius_km` of a center (boundary inclusive)
pub fn is_within_radius(point: Coordinate, center: Coordinate, max_radius_km: f64) -> bool {
    distance_km(center, point) <= max_radius_km
}

/// Delivery time window shown to customers, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EtaRange {
    pub min: i64,
    pub max: i64,
}

#[allow(clippy::cast_possible_truncation)]
pub fn estimated_minutes(distance_km: f64) -> EtaRange {
    let travel = (distance_km / AVERAGE_SPEED_KMH * 60.0).round() as i64;
    let base = travel.max(MIN_ETA_MINUTES);
    EtaRange {
        min: base,
        max: base + ETA_BAND_MINUTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).unwrap()
    }

    #[test]
    fn test_haversine_nis_belgrade() {
        let nis = point(43.3209, 21.8958);
        let belgrade = point(44.7866, 20.4489);

        let distance = distance_km(nis, belgrade);
        // Should be approximately 200 km
        assert!(distance > 190.0 && distance < 210.0, "got {distance}");
    }

    #[test]
    fn test_identical_points_are_zero_apart() {
        let store = point(43.276415, 20.011664);
        assert_eq!(distance_km(store, store), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = point(43.276415, 20.011664);
        let b = point(43.2901, 20.0305);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let distance = distance_km(point(0.0, 0.0), point(0.0, 1.0));
        assert!((distance - 111.19).abs() < 0.1, "got {distance}");
    }

    #[test]
    fn test_within_radius_is_inclusive() {
        let center = point(0.0, 0.0);
        let edge = point(0.0, 1.0);
        let radius = distance_km(center, edge);

        assert!(is_within_radius(edge, center, radius));
        assert!(!is_within_radius(edge, center, radius - 1e-6));
    }

    #[test]
    fn test_rejects_out_of_range_and_nan() {
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_eta_has_fifteen_minute_floor() {
        assert_eq!(estimated_minutes(0.0), EtaRange { min: 15, max: 30 });
        assert_eq!(estimated_minutes(3.5), EtaRange { min: 15, max: 30 });
    }

    #[test]
    fn test_eta_scales_with_distance() {
        // 12 km at 30 km/h is 24 minutes
        assert_eq!(estimated_minutes(12.0), EtaRange { min: 24, max: 39 });
    }
}
