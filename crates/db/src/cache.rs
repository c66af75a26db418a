use std::path::Path;
use std::time::{Duration, Instant};

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use helperbot_core::domain::helper::{HelperData, UserId};

use crate::repositories::{encode_langs, helper_from_columns, HelperRepository, RepositoryError};
use crate::{connect_cache, migrations, CachePool};

/// Primary-store tables copied into the local mirror.
pub const MIRRORED_TABLES: &[&str] = &["helpers"];

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("reading primary store failed: {0}")]
    Source(#[source] RepositoryError),
    #[error("cache decode error: {0}")]
    Decode(String),
}

/// Local SQLite mirror of the primary store, rebuilt wholesale on every ready event.
pub struct CacheStore {
    pool: CachePool,
    sync_lock: Mutex<()>,
}

impl CacheStore {
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, CacheError> {
        let pool = connect_cache(path, max_connections).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: CachePool) -> Result<Self, CacheError> {
        migrations::run_cache(&pool).await?;
        Ok(Self { pool, sync_lock: Mutex::new(()) })
    }

    pub fn pool(&self) -> &CachePool {
        &self.pool
    }

    /// Clears every mirrored table.
    pub async fn reset(&self) -> Result<(), CacheError> {
        let _guard = self.sync_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for table in MIRRORED_TABLES {
            let result = sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await?;
            debug!(
                event_name = "cache.reset.table_cleared",
                table = *table,
                rows = result.rows_affected(),
                "cleared mirror table"
            );
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replaces the mirror with the primary store's current content and returns how long
    /// the copy took. The swap is one transaction: a failed sync leaves the previous mirror.
    pub async fn sync(&self, source: &dyn HelperRepository) -> Result<Duration, CacheError> {
        let _guard = self.sync_lock.lock().await;
        let started = Instant::now();

        let helpers = source.list_all().await.map_err(CacheError::Source)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM helpers").execute(&mut *tx).await?;
        for helper in &helpers {
            let langs =
                encode_langs(&helper.langs).map_err(|e| CacheError::Decode(e.to_string()))?;
            sqlx::query("INSERT INTO helpers (user_id, langs, updated_at) VALUES (?, ?, ?)")
                .bind(helper.user_id.as_str())
                .bind(langs)
                .bind(helper.updated_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let elapsed = started.elapsed();
        info!(
            event_name = "cache.sync.completed",
            rows = helpers.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "mirror synchronized from primary store"
        );
        Ok(elapsed)
    }

    /// Row count per mirrored table, in `MIRRORED_TABLES` order.
    pub async fn row_counts(&self) -> Result<Vec<(&'static str, i64)>, CacheError> {
        let mut counts = Vec::with_capacity(MIRRORED_TABLES.len());
        for table in MIRRORED_TABLES {
            let count = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
                .fetch_one(&self.pool)
                .await?
                .try_get::<i64, _>("count")?;
            counts.push((*table, count));
        }
        Ok(counts)
    }

    pub async fn find_helper(&self, user_id: &UserId) -> Result<Option<HelperData>, CacheError> {
        let row = sqlx::query("SELECT user_id, langs, updated_at FROM helpers WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_helper(r)?)),
            None => Ok(None),
        }
    }

    pub async fn list_helpers(&self) -> Result<Vec<HelperData>, CacheError> {
        let rows: Vec<SqliteRow> =
            sqlx::query("SELECT user_id, langs, updated_at FROM helpers ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_helper).collect::<Result<Vec<_>, _>>()
    }

    pub async fn helpers_for_lang(&self, lang: &str) -> Result<Vec<HelperData>, CacheError> {
        let mut helpers = self.list_helpers().await?;
        helpers.retain(|helper| helper.has_role(lang));
        Ok(helpers)
    }
}

fn row_to_helper(row: &SqliteRow) -> Result<HelperData, CacheError> {
    let user_id: String = row.try_get("user_id")?;
    let langs: String = row.try_get("langs")?;
    let updated_at: String = row.try_get("updated_at")?;

    helper_from_columns(user_id, &langs, &updated_at).map_err(|e| CacheError::Decode(e.to_string()))
}
