use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use helperbot_db::HelperRepository;

use crate::events::{EventContext, HandlerError, HandlerResult};
use crate::interactions::{target_user_id, ComponentInvocation};
use crate::messages::{role_removal_message, CLEAR_ROLES_PREFIX};
use crate::registry::ButtonHandler;

/// "Clear all" button on the roles overview; custom id `clearroles-<userId>`.
pub struct ClearRolesButton {
    helpers: Arc<dyn HelperRepository>,
}

impl ClearRolesButton {
    pub fn new(helpers: Arc<dyn HelperRepository>) -> Self {
        Self { helpers }
    }
}

#[async_trait]
impl ButtonHandler for ClearRolesButton {
    fn name(&self) -> &'static str {
        CLEAR_ROLES_PREFIX
    }

    async fn execute(
        &self,
        component: &ComponentInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        let user_id = target_user_id(&component.custom_id)?;
        let change = self.helpers.clear_roles(&user_id).await?;
        info!(
            event_name = "discord.helper.roles_cleared",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id,
            actor_id = %component.user_id,
            removed = change.applied.len(),
            "helper roles cleared"
        );
        Ok(HandlerResult::Responded(role_removal_message(&change.applied, &change.changes.langs)))
    }
}
