use std::env;
use std::time::Duration;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::delivery::geo::Coordinate;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingEnvVar(String),
    #[error("{var} is invalid: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// The one store origin every distance is measured from.
    pub store_location: Coordinate,
    pub store_timezone: Tz,
    pub geocoder_base_url: String,
    pub geocoder_region: String,
    pub geocoder_user_agent: String,
    pub geocoder_timeout_secs: u64,
    pub order_window_recheck: Duration,
    pub order_alert_interval: Duration,
    pub order_alert_duration: Duration,
    pub min_order_amount: Decimal,
    /// Category whose articles do not count towards the minimum order.
    pub min_order_excluded_category: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let or_default =
            |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

        fn parse<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
        }

        let secs = |var: &str, default: &str| -> Result<Duration, ConfigError> {
            let value: u64 = parse(var, &or_default(var, default))?;
            if value == 0 {
                return Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(Duration::from_secs(value))
        };

        let database_url =
            lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let latitude: f64 = parse("STORE_LATITUDE", &or_default("STORE_LATITUDE", "43.276415"))?;
        let longitude: f64 = parse("STORE_LONGITUDE", &or_default("STORE_LONGITUDE", "20.011664"))?;
        let store_location =
            Coordinate::new(latitude, longitude).map_err(|e| ConfigError::InvalidEnvVar {
                var: "STORE_LATITUDE/STORE_LONGITUDE".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            database_url,
            server_host: or_default("SERVER_HOST", "0.0.0.0"),
            server_port: parse("SERVER_PORT", &or_default("SERVER_PORT", "3000"))?,
            store_location,
            store_timezone: parse("STORE_TIMEZONE", &or_default("STORE_TIMEZONE", "Europe/Belgrade"))?,
            geocoder_base_url: or_default("GEOCODER_BASE_URL", "https://nominatim.openstreetmap.org"),
            geocoder_region: or_default("GEOCODER_REGION", "Serbia"),
            geocoder_user_agent: or_default("GEOCODER_USER_AGENT", "grocery-delivery-backend/0.1"),
            geocoder_timeout_secs: parse(
                "GEOCODER_TIMEOUT_SECS",
                &or_default("GEOCODER_TIMEOUT_SECS", "10"),
            )?,
            order_window_recheck: secs("ORDER_WINDOW_RECHECK_SECS", "60")?,
            order_alert_interval: secs("ORDER_ALERT_INTERVAL_SECS", "2")?,
            order_alert_duration: secs("ORDER_ALERT_DURATION_SECS", "300")?,
            min_order_amount: parse("MIN_ORDER_AMOUNT", &or_default("MIN_ORDER_AMOUNT", "2000"))?,
            min_order_excluded_category: Some(or_default("MIN_ORDER_EXCLUDED_CATEGORY", "Cigarete"))
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
