use std::sync::Arc;

use async_trait::async_trait;

use helperbot_core::domain::helper::normalize_role_tag;
use helperbot_db::CacheStore;

use crate::events::{EventContext, HandlerError, HandlerResult};
use crate::interactions::{TextCommandInvocation, TextMessage};
use crate::messages::{help_message, helpers_for_lang_message, MessageBuilder};
use crate::registry::TextCommandHandler;

/// `!helpers <lang>` for members who prefer plain messages.
pub struct HelpersTextCommand {
    cache: Arc<CacheStore>,
}

impl HelpersTextCommand {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl TextCommandHandler for HelpersTextCommand {
    fn name(&self) -> &'static str {
        "helpers"
    }

    async fn execute(
        &self,
        command: &TextCommandInvocation,
        _message: &TextMessage,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        let Some(raw) = command.args.first() else {
            return Ok(HandlerResult::Responded(
                MessageBuilder::new("Usage: `helpers <lang>`").build(),
            ));
        };
        let lang = normalize_role_tag(raw)?;
        let helpers = self.cache.helpers_for_lang(&lang).await?;
        Ok(HandlerResult::Responded(helpers_for_lang_message(&lang, &helpers)))
    }
}

pub struct HelpTextCommand {
    prefix: String,
}

impl HelpTextCommand {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

#[async_trait]
impl TextCommandHandler for HelpTextCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn execute(
        &self,
        _command: &TextCommandInvocation,
        _message: &TextMessage,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        Ok(HandlerResult::Responded(help_message(&self.prefix)))
    }
}
