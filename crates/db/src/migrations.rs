use sqlx::migrate::{MigrateError, Migrator};

use crate::{CachePool, PrimaryPool};

pub static PRIMARY_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/primary");
pub static CACHE_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/cache");

pub async fn run_primary(pool: &PrimaryPool) -> Result<(), MigrateError> {
    PRIMARY_MIGRATOR.run(pool).await
}

pub async fn run_cache(pool: &CachePool) -> Result<(), MigrateError> {
    CACHE_MIGRATOR.run(pool).await
}
