//! On-device key-value cache.
//!
//! Holds small string values that must survive process restarts, most
//! importantly the serialized current user under the `"user"` key.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Persistent string key-value storage.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Value for `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`, returning `true` if it existed.
    async fn remove(&self, key: &str) -> StoreResult<bool>;
}

/// [`LocalCache`] backed by the `local_state` table.
#[derive(Clone)]
pub struct SqliteLocalCache {
    db: Database,
}

impl SqliteLocalCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LocalCache for SqliteLocalCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM local_state WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().timestamp();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO local_state (key, value, updated_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    rusqlite::params![key, value, now],
                )?;
                debug!(key = %key, "local state written");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM local_state WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_cache() -> SqliteLocalCache {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SqliteLocalCache::new(db)
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let cache = setup_cache().await;
        assert!(cache.get("user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = setup_cache().await;
        cache.set("user", "{}").await.unwrap();
        assert_eq!(cache.get("user").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn set_overwrites() {
        let cache = setup_cache().await;
        cache.set("user", "old").await.unwrap();
        cache.set("user", "new").await.unwrap();
        assert_eq!(cache.get("user").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let cache = setup_cache().await;
        cache.set("user", "v").await.unwrap();
        assert!(cache.remove("user").await.unwrap());
        assert!(!cache.remove("user").await.unwrap());
        assert!(cache.get("user").await.unwrap().is_none());
    }
}
