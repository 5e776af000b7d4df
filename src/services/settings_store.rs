use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::Mutex;

use crate::delivery::settings::{DeliverySettings, SettingsFallback};
use crate::delivery::window::SettingsSource;
use crate::entities::app_setting;
use crate::error::{AppError, AppResult};

pub const DELIVERY_SETTINGS_KEY: &str = "delivery_settings";

/// External persistence for delivery settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Raw stored document, if any.
    async fn load_raw(&self) -> AppResult<Option<serde_json::Value>>;
    async fn save(&self, settings: &DeliverySettings) -> AppResult<()>;

    /// Stored settings with defaults filling anything missing or unusable.
    async fn load(&self) -> AppResult<DeliverySettings> {
        let (settings, fallback) = DeliverySettings::from_stored(self.load_raw().await?);
        match fallback {
            SettingsFallback::None => {}
            SettingsFallback::Missing => {
                tracing::info!("No delivery settings stored yet, using defaults");
            }
            SettingsFallback::MissingFields(fields) => {
                tracing::warn!(?fields, "Stored delivery settings incomplete, filling defaults");
            }
            SettingsFallback::Replaced(reason) => {
                tracing::warn!(%reason, "Stored delivery settings unusable, using defaults");
            }
        }
        Ok(settings)
    }
}

pub struct DbSettingsStore {
    db: DatabaseConnection,
}

impl DbSettingsStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for DbSettingsStore {
    async fn load_raw(&self) -> AppResult<Option<serde_json::Value>> {
        let row = app_setting::Entity::find_by_id(DELIVERY_SETTINGS_KEY.to_string())
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn save(&self, settings: &DeliverySettings) -> AppResult<()> {
        let value = serde_json::to_value(settings)
            .map_err(|e| AppError::Internal(format!("Failed to encode settings: {}", e)))?;

        let existing = app_setting::Entity::find_by_id(DELIVERY_SETTINGS_KEY.to_string())
            .one(&self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut active: app_setting::ActiveModel = row.into();
                active.value = Set(value);
                active.updated_at = Set(Utc::now().into());
                active.update(&self.db).await?;
            }
            None => {
                let row = app_setting::ActiveModel {
                    key: Set(DELIVERY_SETTINGS_KEY.to_string()),
                    value: Set(value),
                    updated_at: Set(Utc::now().into()),
                };
                row.insert(&self.db).await?;
            }
        }

        Ok(())
    }
}

/// Live delivery settings: loaded once at startup, replaced only by an
/// explicit admin save.
#[derive(Clone)]
pub struct SettingsHandle {
    current: Arc<RwLock<DeliverySettings>>,
    store: Arc<dyn SettingsStore>,
    /// Held across persist and swap so saves apply in the order they persist.
    save_lock: Arc<Mutex<()>>,
}

impl SettingsHandle {
    pub async fn load(store: Arc<dyn SettingsStore>) -> AppResult<Self> {
        let settings = store.load().await?;
        Ok(Self {
            current: Arc::new(RwLock::new(settings)),
            store,
            save_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn current(&self) -> DeliverySettings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate, persist, then swap in. Nothing changes if persisting fails.
    pub async fn save(&self, settings: DeliverySettings) -> AppResult<DeliverySettings> {
        settings.validate()?;
        let _guard = self.save_lock.lock().await;
        self.store.save(&settings).await?;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        tracing::info!(?settings, "Delivery settings updated");
        Ok(settings)
    }
}

impl SettingsSource for SettingsHandle {
    fn current(&self) -> DeliverySettings {
        SettingsHandle::current(self)
    }
}
