//! Delivery fee policy.
//!
//! A two-tier flat fee: free at or above the subtotal threshold, otherwise
//! one fee inside the pricing tier radius and another beyond it. Addresses
//! outside the hard delivery zone never reach pricing.

use rust_decimal::Decimal;
use serde::Serialize;

use super::geo::{self, Coordinate, EtaRange};
use super::settings::DeliverySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTier {
    Free,
    WithinRadius,
    BeyondRadius,
}

/// A priced delivery with the reasoning behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeQuote {
    pub fee: Decimal,
    pub tier: FeeTier,
    pub distance_km: f64,
    /// How much more the customer must spend for free delivery, if anything.
    pub amount_to_free_delivery: Option<Decimal>,
    pub explanation: String,
    pub eta_minutes: EtaRange,
}

/// Decision table over an already-known distance. First match wins.
pub fn fee_tier(subtotal: Decimal, distance_km: f64, settings: &DeliverySettings) -> FeeTier {
    let threshold = settings.free_delivery_threshold;
    if threshold > Decimal::ZERO && subtotal >= threshold {
        FeeTier::Free
    } else if distance_km <= settings.distance_threshold_km {
        FeeTier::WithinRadius
    } else {
        FeeTier::BeyondRadius
    }
}

pub fn fee_for_tier(tier: FeeTier, settings: &DeliverySettings) -> Decimal {
    match tier {
        FeeTier::Free => Decimal::ZERO,
        FeeTier::WithinRadius => settings.under_threshold_fee,
        FeeTier::BeyondRadius => settings.over_distance_fee,
    }
}

pub fn is_within_delivery_zone(store: Coordinate, location: Coordinate, max_radius_km: f64) -> bool {
    geo::is_within_radius(location, store, max_radius_km)
}

/// Binds the single store origin to a settings snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicy<'a> {
    store: Coordinate,
    settings: &'a DeliverySettings,
}

impl<'a> FeePolicy<'a> {
    pub fn new(store: Coordinate, settings: &'a DeliverySettings) -> Self {
        Self { store, settings }
    }

    pub fn distance_km(&self, location: Coordinate) -> f64 {
        geo::distance_km(self.store, location)
    }

    pub fn compute_fee(&self, subtotal: Decimal, location: Coordinate) -> Decimal {
        let tier = fee_tier(subtotal, self.distance_km(location), self.settings);
        fee_for_tier(tier, self.settings)
    }

    pub fn is_within_delivery_zone(&self, location: Coordinate) -> bool {
        is_within_delivery_zone(self.store, location, self.settings.max_delivery_radius_km)
    }

    pub fn quote(&self, subtotal: Decimal, location: Coordinate) -> FeeQuote {
        let distance_km = self.distance_km(location);
        let tier = fee_tier(subtotal, distance_km, self.settings);
        let fee = fee_for_tier(tier, self.settings);
        let threshold = self.settings.free_delivery_threshold;

        let amount_to_free_delivery = (tier != FeeTier::Free && threshold > Decimal::ZERO)
            .then(|| threshold - subtotal);

        let explanation = match tier {
            FeeTier::Free => format!("Free delivery for orders of {threshold} or more."),
            FeeTier::WithinRadius => format!(
                "Delivery fee {fee} for orders under {threshold} within {} km ({distance_km:.1} km away).",
                self.settings.distance_threshold_km
            ),
            FeeTier::BeyondRadius => format!(
                "Delivery fee {fee} for orders under {threshold} beyond {} km ({distance_km:.1} km away).",
                self.settings.distance_threshold_km
            ),
        };

        FeeQuote {
            fee,
            tier,
            distance_km,
            amount_to_free_delivery,
            explanation,
            eta_minutes: geo::estimated_minutes(distance_km),
        }
    }
}
