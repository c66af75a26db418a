use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use helperbot_db::HelperRepository;

use crate::events::{EventContext, HandlerError, HandlerResult};
use crate::interactions::{target_user_id, ComponentInvocation};
use crate::messages::{role_removal_message, ROLES_MENU_PREFIX};
use crate::registry::MenuHandler;

/// Removal menu on the roles overview; custom id `lroles-<userId>`, values are role tags.
pub struct RolesMenu {
    helpers: Arc<dyn HelperRepository>,
}

impl RolesMenu {
    pub fn new(helpers: Arc<dyn HelperRepository>) -> Self {
        Self { helpers }
    }
}

#[async_trait]
impl MenuHandler for RolesMenu {
    fn name(&self) -> &'static str {
        ROLES_MENU_PREFIX
    }

    async fn execute(
        &self,
        component: &ComponentInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        let user_id = target_user_id(&component.custom_id)?;
        let change = self.helpers.remove_roles(&user_id, &component.values).await?;
        info!(
            event_name = "discord.helper.roles_removed",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id,
            actor_id = %component.user_id,
            removed = change.applied.len(),
            remaining = change.changes.langs.len(),
            "helper roles removed"
        );
        Ok(HandlerResult::Responded(role_removal_message(&change.applied, &change.changes.langs)))
    }
}
