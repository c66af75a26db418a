pub mod cache;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use cache::{CacheError, CacheStore, MIRRORED_TABLES};
pub use connection::{
    connect_cache, connect_cache_url, connect_primary, primary_connect_options, CachePool,
    PrimaryPool,
};
pub use repositories::{
    HelperRepository, InMemoryHelperRepository, RepositoryError, SqlHelperRepository,
};
