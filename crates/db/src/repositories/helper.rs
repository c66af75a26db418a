use sqlx::mysql::MySqlRow;
use sqlx::Row;

use helperbot_core::domain::helper::{HelperData, RoleChange, UserId};

use super::{encode_langs, helper_from_columns, HelperRepository, RepositoryError};
use crate::PrimaryPool;

pub struct SqlHelperRepository {
    pool: PrimaryPool,
}

impl SqlHelperRepository {
    pub fn new(pool: PrimaryPool) -> Self {
        Self { pool }
    }

    /// Read-modify-write of one record under a row lock. Nothing is written when the
    /// mutation applies no change, so removals never create empty records.
    async fn mutate<F>(&self, user_id: &UserId, apply: F) -> Result<RoleChange, RepositoryError>
    where
        F: FnOnce(&mut HelperData) -> Vec<String> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT user_id, langs, updated_at FROM helpers WHERE user_id = ? FOR UPDATE",
        )
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let mut helper = match row {
            Some(ref r) => row_to_helper(r)?,
            None => HelperData::new(user_id.clone()),
        };
        let applied = apply(&mut helper);

        if !applied.is_empty() {
            sqlx::query(
                "INSERT INTO helpers (user_id, langs, updated_at) VALUES (?, ?, ?)
                 ON DUPLICATE KEY UPDATE langs = VALUES(langs), updated_at = VALUES(updated_at)",
            )
            .bind(helper.user_id.as_str())
            .bind(encode_langs(&helper.langs)?)
            .bind(helper.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(RoleChange { changes: helper, applied })
    }
}

fn row_to_helper(row: &MySqlRow) -> Result<HelperData, RepositoryError> {
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let langs: String = row.try_get("langs").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    helper_from_columns(user_id, &langs, &updated_at)
}

#[async_trait::async_trait]
impl HelperRepository for SqlHelperRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<HelperData>, RepositoryError> {
        let row = sqlx::query("SELECT user_id, langs, updated_at FROM helpers WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_helper(r)?)),
            None => Ok(None),
        }
    }

    async fn add_roles(
        &self,
        user_id: &UserId,
        roles: &[String],
    ) -> Result<RoleChange, RepositoryError> {
        self.mutate(user_id, |helper| helper.add_roles(roles)).await
    }

    async fn remove_roles(
        &self,
        user_id: &UserId,
        roles: &[String],
    ) -> Result<RoleChange, RepositoryError> {
        self.mutate(user_id, |helper| helper.remove_roles(roles)).await
    }

    async fn clear_roles(&self, user_id: &UserId) -> Result<RoleChange, RepositoryError> {
        self.mutate(user_id, HelperData::clear_roles).await
    }

    async fn list_all(&self) -> Result<Vec<HelperData>, RepositoryError> {
        let rows: Vec<MySqlRow> =
            sqlx::query("SELECT user_id, langs, updated_at FROM helpers ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_helper).collect::<Result<Vec<_>, _>>()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM helpers")
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(count)
    }
}
