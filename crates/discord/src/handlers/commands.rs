use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use helperbot_core::domain::helper::{normalize_role_tag, parse_role_tags, UserId};
use helperbot_db::{CacheStore, HelperRepository};

use crate::events::{EventContext, HandlerError, HandlerResult};
use crate::interactions::CommandInvocation;
use crate::messages::{
    helpers_for_lang_message, pong_message, roles_added_message, roles_overview_message,
};
use crate::registry::{
    CommandDefinition, CommandHandler, OptionDefinition, OptionKind, SubcommandDefinition,
};

/// `/helper add` and `/helper roles`, both writing through the primary store.
pub struct HelperCommand {
    helpers: Arc<dyn HelperRepository>,
}

impl HelperCommand {
    pub fn new(helpers: Arc<dyn HelperRepository>) -> Self {
        Self { helpers }
    }

    async fn add(
        &self,
        command: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        let user_id = target_user(command)?;
        let langs = command.string_option("langs").ok_or(HandlerError::MissingOption("langs"))?;
        let tags = parse_role_tags(langs)?;

        let change = self.helpers.add_roles(&user_id, &tags).await?;
        info!(
            event_name = "discord.helper.roles_added",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id,
            added = change.applied.len(),
            "helper roles added"
        );
        Ok(HandlerResult::Responded(roles_added_message(
            user_id.as_str(),
            &change.applied,
            &change.changes.langs,
        )))
    }

    async fn roles(&self, command: &CommandInvocation) -> Result<HandlerResult, HandlerError> {
        let user_id = target_user(command)?;
        let langs = self.helpers.find(&user_id).await?.map(|helper| helper.langs).unwrap_or_default();
        Ok(HandlerResult::Responded(roles_overview_message(user_id.as_str(), &langs)))
    }
}

fn target_user(command: &CommandInvocation) -> Result<UserId, HandlerError> {
    let raw = command.user_option("user").ok_or(HandlerError::MissingOption("user"))?;
    Ok(UserId::parse(raw)?)
}

#[async_trait]
impl CommandHandler for HelperCommand {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("helper", "Manage helper roles")
            .subcommand(SubcommandDefinition {
                name: "add",
                description: "Give a user one or more helper roles",
                options: vec![
                    OptionDefinition::required("user", "Member to update", OptionKind::User),
                    OptionDefinition::required(
                        "langs",
                        "Comma separated role tags, e.g. en, fr",
                        OptionKind::String,
                    ),
                ],
            })
            .subcommand(SubcommandDefinition {
                name: "roles",
                description: "Show and remove a user's helper roles",
                options: vec![OptionDefinition::required(
                    "user",
                    "Member to inspect",
                    OptionKind::User,
                )],
            })
            .manage_roles()
    }

    async fn execute(
        &self,
        command: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        match command.subcommand.as_deref() {
            Some("add") => self.add(command, ctx).await,
            Some("roles") => self.roles(command).await,
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

/// `/helpers lang:` answered from the local mirror.
pub struct HelpersCommand {
    cache: Arc<CacheStore>,
}

impl HelpersCommand {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CommandHandler for HelpersCommand {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("helpers", "List helpers for a language").option(
            OptionDefinition::required("lang", "Role tag to look up", OptionKind::String),
        )
    }

    async fn execute(
        &self,
        command: &CommandInvocation,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        let raw = command.string_option("lang").ok_or(HandlerError::MissingOption("lang"))?;
        let lang = normalize_role_tag(raw)?;
        let helpers = self.cache.helpers_for_lang(&lang).await?;
        Ok(HandlerResult::Responded(helpers_for_lang_message(&lang, &helpers)))
    }
}

pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition::new("ping", "Check that the bot is responsive")
    }

    async fn execute(
        &self,
        _command: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError> {
        Ok(HandlerResult::Responded(pong_message(ctx.latency_ms)))
    }
}
