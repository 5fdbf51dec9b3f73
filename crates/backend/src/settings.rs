//! Business settings: an explicit struct behind an explicit store.
//!
//! Settings live in one JSONB row and are loaded into a [`BusinessSettings`]
//! value that callers pass by reference to whatever needs it. There is no
//! global mutable state; a caller that wants fresh values asks the store to
//! [`SettingsStore::reload`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

/// Settings row key for the storewide business settings.
const BUSINESS_SETTINGS_KEY: &str = "business";

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storewide business settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessSettings {
    // Store info
    pub store_name: String,
    pub store_tagline: String,
    pub store_email: String,
    pub store_phone: String,
    pub store_address: String,

    // Order settings
    pub minimum_order_value: rust_decimal::Decimal,
    pub delivery_fee: rust_decimal::Decimal,
    pub free_delivery_threshold: rust_decimal::Decimal,
    pub pickup_available: bool,
    pub delivery_available: bool,

    // Fulfillment settings
    pub default_lead_time_hours: i32,
    /// Orders placed before this hour can be fulfilled same-day.
    pub same_day_cutoff_hour: u8,
    pub available_time_slots: Vec<String>,

    // Notification settings
    pub order_notification_email: String,
    pub low_stock_notification_email: String,
    pub notify_on_new_order: bool,
    pub notify_on_low_stock: bool,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        Self {
            store_name: "Butter & Crumb".to_owned(),
            store_tagline: "Small-batch bakes, big flavor".to_owned(),
            store_email: "hello@butterandcrumb.example".to_owned(),
            store_phone: String::new(),
            store_address: String::new(),
            minimum_order_value: rust_decimal::Decimal::ZERO,
            delivery_fee: rust_decimal::Decimal::new(500, 2),
            free_delivery_threshold: rust_decimal::Decimal::new(5000, 2),
            pickup_available: true,
            delivery_available: true,
            default_lead_time_hours: 24,
            same_day_cutoff_hour: 12,
            available_time_slots: vec![
                "9:00 AM - 12:00 PM".to_owned(),
                "12:00 PM - 3:00 PM".to_owned(),
                "3:00 PM - 6:00 PM".to_owned(),
            ],
            order_notification_email: String::new(),
            low_stock_notification_email: String::new(),
            notify_on_new_order: true,
            notify_on_low_stock: true,
        }
    }
}

/// Field mask for partially updating business settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub store_name: Option<String>,
    pub store_tagline: Option<String>,
    pub store_email: Option<String>,
    pub store_phone: Option<String>,
    pub store_address: Option<String>,
    pub minimum_order_value: Option<rust_decimal::Decimal>,
    pub delivery_fee: Option<rust_decimal::Decimal>,
    pub free_delivery_threshold: Option<rust_decimal::Decimal>,
    pub pickup_available: Option<bool>,
    pub delivery_available: Option<bool>,
    pub default_lead_time_hours: Option<i32>,
    pub same_day_cutoff_hour: Option<u8>,
    pub available_time_slots: Option<Vec<String>>,
    pub order_notification_email: Option<String>,
    pub low_stock_notification_email: Option<String>,
    pub notify_on_new_order: Option<bool>,
    pub notify_on_low_stock: Option<bool>,
}

impl SettingsUpdate {
    /// Apply the mask, returning the updated settings.
    #[must_use]
    pub fn apply(&self, settings: &BusinessSettings) -> BusinessSettings {
        let mut updated = settings.clone();
        if let Some(store_name) = &self.store_name {
            updated.store_name = store_name.clone();
        }
        if let Some(store_tagline) = &self.store_tagline {
            updated.store_tagline = store_tagline.clone();
        }
        if let Some(store_email) = &self.store_email {
            updated.store_email = store_email.clone();
        }
        if let Some(store_phone) = &self.store_phone {
            updated.store_phone = store_phone.clone();
        }
        if let Some(store_address) = &self.store_address {
            updated.store_address = store_address.clone();
        }
        if let Some(minimum_order_value) = self.minimum_order_value {
            updated.minimum_order_value = minimum_order_value;
        }
        if let Some(delivery_fee) = self.delivery_fee {
            updated.delivery_fee = delivery_fee;
        }
        if let Some(free_delivery_threshold) = self.free_delivery_threshold {
            updated.free_delivery_threshold = free_delivery_threshold;
        }
        if let Some(pickup_available) = self.pickup_available {
            updated.pickup_available = pickup_available;
        }
        if let Some(delivery_available) = self.delivery_available {
            updated.delivery_available = delivery_available;
        }
        if let Some(default_lead_time_hours) = self.default_lead_time_hours {
            updated.default_lead_time_hours = default_lead_time_hours;
        }
        if let Some(same_day_cutoff_hour) = self.same_day_cutoff_hour {
            updated.same_day_cutoff_hour = same_day_cutoff_hour;
        }
        if let Some(available_time_slots) = &self.available_time_slots {
            updated.available_time_slots = available_time_slots.clone();
        }
        if let Some(order_notification_email) = &self.order_notification_email {
            updated.order_notification_email = order_notification_email.clone();
        }
        if let Some(low_stock_notification_email) = &self.low_stock_notification_email {
            updated.low_stock_notification_email = low_stock_notification_email.clone();
        }
        if let Some(notify_on_new_order) = self.notify_on_new_order {
            updated.notify_on_new_order = notify_on_new_order;
        }
        if let Some(notify_on_low_stock) = self.notify_on_low_stock {
            updated.notify_on_low_stock = notify_on_low_stock;
        }
        updated
    }
}

/// Get a raw setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<JsonValue>, SettingsError> {
    let result: Option<JsonValue> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(result)
}

/// Set a raw setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_setting(pool: &PgPool, key: &str, value: &JsonValue) -> Result<(), SettingsError> {
    sqlx::query(
        r"
        INSERT INTO settings (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
        ",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Typed store for the business settings row.
pub struct SettingsStore {
    pool: PgPool,
    current: BusinessSettings,
}

impl SettingsStore {
    /// Load the store, falling back to defaults when no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the stored JSON does
    /// not deserialize.
    pub async fn load(pool: PgPool) -> Result<Self, SettingsError> {
        let current = read_settings(&pool).await?;
        Ok(Self { pool, current })
    }

    /// The currently loaded settings.
    #[must_use]
    pub const fn current(&self) -> &BusinessSettings {
        &self.current
    }

    /// Apply a field-mask update, persist, and keep the new value loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails; the loaded value is unchanged
    /// in that case.
    pub async fn update(&mut self, update: &SettingsUpdate) -> Result<&BusinessSettings, SettingsError> {
        let updated = update.apply(&self.current);
        let value = serde_json::to_value(&updated)?;
        set_setting(&self.pool, BUSINESS_SETTINGS_KEY, &value).await?;

        self.current = updated;
        tracing::info!("business settings updated");
        Ok(&self.current)
    }

    /// Re-read the settings row, replacing the loaded value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn reload(&mut self) -> Result<&BusinessSettings, SettingsError> {
        self.current = read_settings(&self.pool).await?;
        Ok(&self.current)
    }
}

async fn read_settings(pool: &PgPool) -> Result<BusinessSettings, SettingsError> {
    match get_setting(pool, BUSINESS_SETTINGS_KEY).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(BusinessSettings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BusinessSettings::default();
        assert_eq!(settings.store_name, "Butter & Crumb");
        assert!(settings.pickup_available);
        assert_eq!(settings.default_lead_time_hours, 24);
        assert_eq!(settings.available_time_slots.len(), 3);
    }

    #[test]
    fn test_update_mask_applies_only_set_fields() {
        let settings = BusinessSettings::default();
        let update = SettingsUpdate {
            store_phone: Some("+1 503 555 0100".to_owned()),
            delivery_available: Some(false),
            ..SettingsUpdate::default()
        };

        let updated = update.apply(&settings);
        assert_eq!(updated.store_phone, "+1 503 555 0100");
        assert!(!updated.delivery_available);
        assert_eq!(updated.store_name, settings.store_name);
        assert_eq!(updated.delivery_fee, settings.delivery_fee);
    }

    #[test]
    fn test_settings_json_roundtrip() {
        let settings = BusinessSettings::default();
        let value = serde_json::to_value(&settings).expect("serialize");
        let back: BusinessSettings = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        // Rows written by older versions may miss newer fields
        let value = serde_json::json!({ "store_name": "Test Bakery" });
        let settings: BusinessSettings = serde_json::from_value(value).expect("deserialize");
        assert_eq!(settings.store_name, "Test Bakery");
        assert_eq!(settings.default_lead_time_hours, 24);
    }
}
