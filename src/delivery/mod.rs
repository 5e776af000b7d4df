//! Delivery pricing, geofencing and order-window rules.
//!
//! Everything here except the search, picker and monitor types is pure and
//! synchronous.

pub mod cart;
pub mod fee;
pub mod geo;
pub mod geofence;
pub mod picker;
pub mod search;
pub mod settings;
pub mod window;

pub use fee::{FeePolicy, FeeQuote, FeeTier};
pub use geo::{Coordinate, EtaRange, distance_km, estimated_minutes};
pub use geofence::{CustomerLocation, GpsError, LocationRejection};
pub use settings::{DeliveryRadii, DeliverySettings, SettingsError};
pub use window::{Clock, OrderWindowMonitor, StoreClock, WindowStatus};
