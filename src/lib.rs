pub mod config;
pub mod db;
pub mod delivery;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use delivery::{Clock, Coordinate};
use services::{Geocoder, OrderAlert, OrderFeed, SettingsHandle};

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub settings: SettingsHandle,
    pub geocoder: Arc<dyn Geocoder>,
    pub clock: Arc<dyn Clock>,
    pub feed: OrderFeed,
    pub alert: OrderAlert,
}

impl AppState {
    pub fn store_location(&self) -> Coordinate {
        self.config.store_location
    }
}
