//! Sync configuration collaborator
//!
//! Global knobs (max attempts) plus per-store settings: whether sync is
//! enabled, which host order statuses are excluded from queueing, which
//! customer attribute carries the IP address, and the store's API key
//! (the migration grouping key).

use std::collections::{HashMap, HashSet};

use sqlx::Row;

/// Default retry threshold when nothing is configured.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Read access to sync configuration.
pub trait ConfigProvider: Send + Sync {
    /// Retry threshold for failed sync attempts.
    fn max_attempts(&self) -> i32;

    /// Whether the store participates in order sync.
    fn sync_enabled(&self, store_id: i64) -> bool;

    /// Host order statuses excluded from queueing for this store.
    fn excluded_statuses(&self, store_id: i64) -> HashSet<String>;

    /// Customer attribute holding the order IP address for this store.
    fn ip_address_attribute(&self, store_id: i64) -> String;

    /// API credential for the store's analytics account, when integrated.
    fn api_key(&self, store_id: i64) -> Option<String>;

    /// All stores known to be integrated (configured with an API key).
    fn integrated_stores(&self) -> Vec<i64>;
}

/// Per-store settings block.
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    pub sync_enabled: bool,
    pub excluded_statuses: HashSet<String>,
    pub ip_address_attribute: Option<String>,
    pub api_key: Option<String>,
}

/// [`ConfigProvider`] holding settings in memory, seeded from the
/// environment and amended per store.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    max_attempts: i32,
    default_ip_attribute: String,
    stores: HashMap<i64, StoreSettings>,
}

impl SyncConfig {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            max_attempts,
            default_ip_attribute: "remote_ip".to_string(),
            stores: HashMap::new(),
        }
    }

    /// Build from environment variables, falling back to defaults.
    ///
    /// - `ORDERSYNC_MAX_ATTEMPTS` (default 5)
    /// - `ORDERSYNC_IP_ADDRESS_ATTRIBUTE` (default "remote_ip")
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("ORDERSYNC_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let default_ip_attribute = std::env::var("ORDERSYNC_IP_ADDRESS_ATTRIBUTE")
            .unwrap_or_else(|_| "remote_ip".to_string());

        Self {
            max_attempts,
            default_ip_attribute,
            stores: HashMap::new(),
        }
    }

    pub fn with_store(mut self, store_id: i64, settings: StoreSettings) -> Self {
        self.stores.insert(store_id, settings);
        self
    }

    pub fn set_store(&mut self, store_id: i64, settings: StoreSettings) {
        self.stores.insert(store_id, settings);
    }

    /// Merge per-store rows from the `sync_store_config` table on top of
    /// the current settings. Excluded statuses are stored comma-separated.
    pub async fn load_stores(&mut self, pool: &sqlx::SqlitePool) -> crate::error::SyncResult<()> {
        let rows = sqlx::query(
            "SELECT store_id, sync_enabled, api_key, ip_address_attribute, excluded_statuses
             FROM sync_store_config",
        )
        .fetch_all(pool)
        .await?;

        for row in rows {
            let store_id: i64 = row.get("store_id");
            let enabled: i64 = row.get("sync_enabled");
            let excluded: String = row.get("excluded_statuses");
            self.stores.insert(
                store_id,
                StoreSettings {
                    sync_enabled: enabled != 0,
                    api_key: row.get("api_key"),
                    ip_address_attribute: row.get("ip_address_attribute"),
                    excluded_statuses: excluded
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                },
            );
        }
        Ok(())
    }
}

impl ConfigProvider for SyncConfig {
    fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    fn sync_enabled(&self, store_id: i64) -> bool {
        self.stores
            .get(&store_id)
            .map(|s| s.sync_enabled)
            .unwrap_or(false)
    }

    fn excluded_statuses(&self, store_id: i64) -> HashSet<String> {
        self.stores
            .get(&store_id)
            .map(|s| s.excluded_statuses.clone())
            .unwrap_or_default()
    }

    fn ip_address_attribute(&self, store_id: i64) -> String {
        self.stores
            .get(&store_id)
            .and_then(|s| s.ip_address_attribute.clone())
            .unwrap_or_else(|| self.default_ip_attribute.clone())
    }

    fn api_key(&self, store_id: i64) -> Option<String> {
        self.stores.get(&store_id).and_then(|s| s.api_key.clone())
    }

    fn integrated_stores(&self) -> Vec<i64> {
        let mut stores: Vec<i64> = self
            .stores
            .iter()
            .filter(|(_, s)| s.api_key.is_some())
            .map(|(id, _)| *id)
            .collect();
        stores.sort_unstable();
        stores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(enabled: bool, api_key: Option<&str>) -> StoreSettings {
        StoreSettings {
            sync_enabled: enabled,
            api_key: api_key.map(String::from),
            ..StoreSettings::default()
        }
    }

    #[test]
    fn unknown_store_is_disabled() {
        let config = SyncConfig::new(3);
        assert!(!config.sync_enabled(99));
        assert_eq!(config.api_key(99), None);
    }

    #[test]
    fn integrated_stores_require_api_key() {
        let config = SyncConfig::new(3)
            .with_store(1, store(true, Some("key-a")))
            .with_store(2, store(true, None))
            .with_store(3, store(false, Some("key-b")));

        assert_eq!(config.integrated_stores(), vec![1, 3]);
    }

    #[test]
    fn ip_attribute_falls_back_to_default() {
        let config = SyncConfig::new(3).with_store(1, store(true, None));
        assert_eq!(config.ip_address_attribute(1), "remote_ip");
        assert_eq!(config.ip_address_attribute(7), "remote_ip");
    }

    #[tokio::test]
    async fn load_stores_merges_table_rows() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::repository::sqlite::ensure_schema(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO sync_store_config
             (store_id, sync_enabled, api_key, ip_address_attribute, excluded_statuses)
             VALUES (1, 1, 'key-a', NULL, 'canceled, fraud'), (2, 0, NULL, 'x_forwarded_for', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let mut config = SyncConfig::new(3);
        config.load_stores(&pool).await.unwrap();

        assert!(config.sync_enabled(1));
        assert!(!config.sync_enabled(2));
        assert_eq!(config.api_key(1).as_deref(), Some("key-a"));
        assert_eq!(config.ip_address_attribute(2), "x_forwarded_for");
        let excluded = config.excluded_statuses(1);
        assert!(excluded.contains("canceled") && excluded.contains("fraud"));
        assert_eq!(config.integrated_stores(), vec![1]);
    }
}
