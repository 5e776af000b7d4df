use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operator-configured pricing and ordering policy.
///
/// Field names serialize in camelCase so documents written by the admin
/// panel load unchanged. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliverySettings {
    /// Cart subtotal at or above which delivery is free. Zero disables the rule.
    pub free_delivery_threshold: Decimal,
    /// Fee below the threshold when the address is inside the pricing tier radius.
    pub under_threshold_fee: Decimal,
    /// Pricing tier radius in km.
    pub distance_threshold_km: f64,
    /// Fee below the threshold when the address is beyond the pricing tier radius.
    pub over_distance_fee: Decimal,
    /// First hour (store-local) at which orders are accepted.
    pub order_start_hour: u32,
    /// Hour (store-local, exclusive) at which ordering closes; 24 means midnight.
    pub order_end_hour: u32,
    /// Hard delivery zone in km; addresses beyond it are rejected outright.
    pub max_delivery_radius_km: f64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Decimal::from(2000),
            under_threshold_fee: Decimal::from(100),
            distance_threshold_km: 2.0,
            over_distance_fee: Decimal::from(300),
            order_start_hour: 8,
            order_end_hour: 20,
            max_delivery_radius_km: 3.5,
        }
    }
}

/// The two radii the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeliveryRadii {
    pub pricing_tier_radius_km: f64,
    pub hard_zone_radius_km: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("order hours must satisfy 0 <= start < end <= 24 (got {start}-{end})")]
    InvalidHours { start: u32, end: u32 },
    #[error("{0} must be a positive number of kilometers")]
    NonPositiveRadius(&'static str),
    #[error("{0} must not be negative")]
    NegativeAmount(&'static str),
}

/// How a stored settings document was turned into usable settings.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsFallback {
    /// Stored document was complete and valid.
    None,
    /// Nothing stored yet.
    Missing,
    /// Listed fields were absent and took their defaults.
    MissingFields(Vec<&'static str>),
    /// Document could not be used at all; defaults replace it.
    Replaced(String),
}

impl DeliverySettings {
    pub const FIELDS: [&'static str; 7] = [
        "freeDeliveryThreshold",
        "underThresholdFee",
        "distanceThresholdKm",
        "overDistanceFee",
        "orderStartHour",
        "orderEndHour",
        "maxDeliveryRadiusKm",
    ];

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.order_start_hour >= self.order_end_hour || self.order_end_hour > 24 {
            return Err(SettingsError::InvalidHours {
                start: self.order_start_hour,
                end: self.order_end_hour,
            });
        }

        for (name, radius) in [
            ("distanceThresholdKm", self.distance_threshold_km),
            ("maxDeliveryRadiusKm", self.max_delivery_radius_km),
        ] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(SettingsError::NonPositiveRadius(name));
            }
        }

        for (name, amount) in [
            ("freeDeliveryThreshold", self.free_delivery_threshold),
            ("underThresholdFee", self.under_threshold_fee),
            ("overDistanceFee", self.over_distance_fee),
        ] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(SettingsError::NegativeAmount(name));
            }
        }

        Ok(())
    }

    pub fn radii(&self) -> DeliveryRadii {
        DeliveryRadii {
            pricing_tier_radius_km: self.distance_threshold_km,
            hard_zone_radius_km: self.max_delivery_radius_km,
        }
    }

    /// Turn a stored document into settings, never failing.
    pub fn from_stored(stored: Option<serde_json::Value>) -> (Self, SettingsFallback) {
        let Some(value) = stored else {
            return (Self::default(), SettingsFallback::Missing);
        };

        let Some(object) = value.as_object() else {
            return (
                Self::default(),
                SettingsFallback::Replaced("stored settings are not an object".to_string()),
            );
        };

        let missing: Vec<&'static str> = Self::FIELDS
            .into_iter()
            .filter(|field| !object.contains_key(*field))
            .collect();

        let settings: Self = match serde_json::from_value(value) {
            Ok(settings) => settings,
            Err(e) => return (Self::default(), SettingsFallback::Replaced(e.to_string())),
        };

        if let Err(e) = settings.validate() {
            return (Self::default(), SettingsFallback::Replaced(e.to_string()));
        }

        if missing.is_empty() {
            (settings, SettingsFallback::None)
        } else {
            (settings, SettingsFallback::MissingFields(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(DeliverySettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_hours() {
        let settings = DeliverySettings {
            order_start_hour: 20,
            order_end_hour: 8,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidHours { start: 20, end: 8 })
        );
    }

    #[test]
    fn allows_ordering_until_midnight() {
        let settings = DeliverySettings {
            order_start_hour: 0,
            order_end_hour: 24,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Ok(()));

        let past_midnight = DeliverySettings {
            order_end_hour: 25,
            ..settings
        };
        assert!(past_midnight.validate().is_err());
    }

    #[test]
    fn rejects_zero_radius_and_negative_fee() {
        let settings = DeliverySettings {
            distance_threshold_km: 0.0,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::NonPositiveRadius("distanceThresholdKm"))
        );

        let settings = DeliverySettings {
            over_distance_fee: Decimal::from(-1),
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::NegativeAmount("overDistanceFee"))
        );
    }

    #[test]
    fn nothing_stored_uses_defaults() {
        let (settings, fallback) = DeliverySettings::from_stored(None);
        assert_eq!(settings, DeliverySettings::default());
        assert_eq!(fallback, SettingsFallback::Missing);
    }

    #[test]
    fn complete_document_loads_as_is() {
        let stored = json!({
            "freeDeliveryThreshold": 2500,
            "underThresholdFee": 150,
            "distanceThresholdKm": 3.0,
            "overDistanceFee": 250,
            "orderStartHour": 9,
            "orderEndHour": 22,
            "maxDeliveryRadiusKm": 5.0
        });

        let (settings, fallback) = DeliverySettings::from_stored(Some(stored));
        assert_eq!(fallback, SettingsFallback::None);
        assert_eq!(settings.free_delivery_threshold, Decimal::from(2500));
        assert_eq!(settings.order_end_hour, 22);
        assert_eq!(settings.max_delivery_radius_km, 5.0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        // Documents saved before the hard zone radius existed
        let stored = json!({
            "freeDeliveryThreshold": 2000,
            "underThresholdFee": 100,
            "distanceThresholdKm": 2.5,
            "overDistanceFee": 300,
            "orderStartHour": 8,
            "orderEndHour": 20
        });

        let (settings, fallback) = DeliverySettings::from_stored(Some(stored));
        assert_eq!(
            fallback,
            SettingsFallback::MissingFields(vec!["maxDeliveryRadiusKm"])
        );
        assert_eq!(settings.distance_threshold_km, 2.5);
        assert_eq!(settings.max_delivery_radius_km, 3.5);
    }

    #[test]
    fn invalid_document_is_replaced_by_defaults() {
        let stored = json!({ "orderStartHour": 22, "orderEndHour": 6 });
        let (settings, fallback) = DeliverySettings::from_stored(Some(stored));
        assert_eq!(settings, DeliverySettings::default());
        assert!(matches!(fallback, SettingsFallback::Replaced(_)));

        let (_, fallback) = DeliverySettings::from_stored(Some(json!("garbage")));
        assert!(matches!(fallback, SettingsFallback::Replaced(_)));
    }
}
