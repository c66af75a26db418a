use std::collections::BTreeMap;

use tokio::sync::RwLock;

use helperbot_core::domain::helper::{HelperData, RoleChange, UserId};

use super::{HelperRepository, RepositoryError};

/// Primary-store stand-in for tests and local runs without MySQL.
#[derive(Default)]
pub struct InMemoryHelperRepository {
    helpers: RwLock<BTreeMap<String, HelperData>>,
}

impl InMemoryHelperRepository {
    pub fn with_helpers(helpers: impl IntoIterator<Item = HelperData>) -> Self {
        let helpers =
            helpers.into_iter().map(|helper| (helper.user_id.0.clone(), helper)).collect();
        Self { helpers: RwLock::new(helpers) }
    }

    async fn mutate<F>(&self, user_id: &UserId, apply: F) -> Result<RoleChange, RepositoryError>
    where
        F: FnOnce(&mut HelperData) -> Vec<String> + Send,
    {
        let mut helpers = self.helpers.write().await;
        let mut helper =
            helpers.get(&user_id.0).cloned().unwrap_or_else(|| HelperData::new(user_id.clone()));
        let applied = apply(&mut helper);
        if !applied.is_empty() {
            helpers.insert(user_id.0.clone(), helper.clone());
        }
        Ok(RoleChange { changes: helper, applied })
    }
}

#[async_trait::async_trait]
impl HelperRepository for InMemoryHelperRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<HelperData>, RepositoryError> {
        let helpers = self.helpers.read().await;
        Ok(helpers.get(&user_id.0).cloned())
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
        let helpers = self.helpers.read().await;
        Ok(helpers.values().cloned().collect())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let helpers = self.helpers.read().await;
        Ok(helpers.len() as i64)
    }
}
