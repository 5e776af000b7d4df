pub mod geocoding;
pub mod notifications;
pub mod settings_store;

pub use geocoding::{GeocodeCandidate, Geocoder, NominatimGeocoder};
pub use notifications::{OrderAlert, OrderArrived, OrderFeed, TracingAlerter};
pub use settings_store::{DbSettingsStore, SettingsHandle, SettingsStore};
