use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use helperbot_core::domain::helper::{HelperData, RoleChange, UserId};

pub mod helper;
pub mod memory;

pub use helper::SqlHelperRepository;
pub use memory::InMemoryHelperRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Query layer over the authoritative helper table.
#[async_trait]
pub trait HelperRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<HelperData>, RepositoryError>;

    async fn add_roles(
        &self,
        user_id: &UserId,
        roles: &[String],
    ) -> Result<RoleChange, RepositoryError>;

    async fn remove_roles(
        &self,
        user_id: &UserId,
        roles: &[String],
    ) -> Result<RoleChange, RepositoryError>;

    async fn clear_roles(&self, user_id: &UserId) -> Result<RoleChange, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<HelperData>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

pub(crate) fn encode_langs(langs: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(langs).map_err(|e| RepositoryError::Decode(e.to_string()))
}

/// Rebuilds a record from its stored columns; shared by the primary and mirror stores.
pub(crate) fn helper_from_columns(
    user_id: String,
    langs: &str,
    updated_at: &str,
) -> Result<HelperData, RepositoryError> {
    let langs: Vec<String> =
        serde_json::from_str(langs).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at = DateTime::parse_from_rfc3339(updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("updated_at for {user_id}: {e}")))?;

    let mut helper = HelperData { user_id: UserId(user_id), langs, updated_at };
    helper.dedup_roles();
    Ok(helper)
}
