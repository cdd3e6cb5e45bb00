/// SQLite-backed preference store
///
/// Each preference is one row keyed by its name. All queries are
/// parameterized.
use async_trait::async_trait;
use sdk::errors::ProviderError;
use sqlx::{Row, SqlitePool};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::prefs::{PrefStore, PrefValue};

fn store_err(context: &str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Store(format!("{}: {}", context, err))
}

/// Preference repository for database operations
#[derive(Clone)]
pub struct SqlitePrefStore {
    pool: SqlitePool,
}

impl SqlitePrefStore {
    /// Create a new preference store over an open pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrefStore for SqlitePrefStore {
    async fn get(&self, key: &str) -> Result<Option<PrefValue>, ProviderError> {
        let row = sqlx::query("SELECT kind, value FROM prefs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to fetch preference", e))?;

        match row {
            Some(r) => {
                let kind: String = r.get("kind");
                let value: String = r.get("value");
                PrefValue::decode(&kind, &value).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: PrefValue) -> Result<(), ProviderError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| store_err("Failed to get current time", e))?
            .as_millis() as i64;

        sqlx::query(
            "INSERT INTO prefs (key, kind, value, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET kind = excluded.kind, value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.kind())
        .bind(value.encode())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to write preference", e))?;

        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), ProviderError> {
        sqlx::query("DELETE FROM prefs WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Failed to clear preference", e))?;

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, ProviderError> {
        sqlx::query_scalar("SELECT key FROM prefs ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("Failed to list preferences", e))
    }

    async fn flush(&self) -> Result<(), ProviderError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Failed to flush WAL", e))?;

        Ok(())
    }
}
