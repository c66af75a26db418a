use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use helperbot_core::config::DatabaseCredentials;
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type PrimaryPool = sqlx::MySqlPool;
pub type CachePool = sqlx::SqlitePool;

/// Connection options for the primary store. TLS is mandatory.
pub fn primary_connect_options(
    credentials: &DatabaseCredentials,
) -> Result<MySqlConnectOptions, sqlx::Error> {
    Ok(MySqlConnectOptions::from_str(credentials.url.trim())?
        .username(credentials.user.trim())
        .password(credentials.password.expose_secret())
        .ssl_mode(MySqlSslMode::Required))
}

pub async fn connect_primary(
    credentials: &DatabaseCredentials,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<PrimaryPool, sqlx::Error> {
    let options = primary_connect_options(credentials)?;
    MySqlPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .test_before_acquire(true)
        .connect_with(options)
        .await
}

/// Opens the mirror file read-write, creating it (and its directory) when missing.
pub async fn connect_cache(path: &Path, max_connections: u32) -> Result<CachePool, sqlx::Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    connect_cache_with_options(options, max_connections).await
}

pub async fn connect_cache_url(
    database_url: &str,
    max_connections: u32,
) -> Result<CachePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    connect_cache_with_options(options, max_connections).await
}

async fn connect_cache_with_options(
    options: SqliteConnectOptions,
    max_connections: u32,
) -> Result<CachePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(30))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options.serialized(true))
        .await
}

#[cfg(test)]
mod tests {
    use helperbot_core::config::DatabaseCredentials;

    use super::{connect_cache, connect_cache_url, primary_connect_options};

    #[test]
    fn primary_options_require_tls() {
        let credentials = DatabaseCredentials {
            url: "mysql://db.internal:3306/helpers".to_string(),
            user: "bot".to_string(),
            password: "hunter2".to_string().into(),
        };

        let options = primary_connect_options(&credentials).expect("options");
        let debug = format!("{options:?}");
        assert!(debug.contains("Required"), "ssl mode should be required: {debug}");
    }

    #[test]
    fn primary_options_reject_malformed_urls() {
        let credentials = DatabaseCredentials {
            url: "not a url".to_string(),
            user: "bot".to_string(),
            password: String::new().into(),
        };

        assert!(primary_connect_options(&credentials).is_err());
    }

    #[tokio::test]
    async fn cache_file_and_parent_directory_are_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.sqlite");

        let pool = connect_cache(&path, 2).await.expect("open cache file");
        sqlx::query("SELECT 1").execute(&pool).await.expect("query cache");
        pool.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn in_memory_cache_url_connects() {
        let pool = connect_cache_url("sqlite::memory:", 1).await.expect("connect");
        let (value,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await.expect("query");
        assert_eq!(value, 1);
    }
}
