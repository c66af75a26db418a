//! Serenity adapter: converts gateway events into [`Interaction`]s and replies back.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serenity::all::{
    ButtonStyle as GatewayButtonStyle, Client, Command, CommandDataOption,
    CommandDataOptionValue, CommandInteraction, CommandOptionType, ComponentInteraction,
    ComponentInteractionDataKind, Context, CreateActionRow, CreateAllowedMentions, CreateButton,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, EventHandler, GatewayIntents, Http, Interaction as GatewayInteraction,
    Message, Permissions, Ready, ShardManager,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::events::{
    CommandRegistrar, EventContext, EventDispatcher, HandlerError, HandlerResult, LifecycleEvent,
    ReadyInfo,
};
use crate::interactions::{
    CommandInvocation, CommandOption, ComponentInvocation, Interaction, OptionValue, TextMessage,
};
use crate::messages::{ButtonStyle, Component, MessageTemplate};
use crate::registry::{CommandDefinition, OptionDefinition, OptionKind};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build gateway client: {0}")]
    Client(#[source] serenity::Error),
    #[error("gateway connection ended with error: {0}")]
    Connection(#[source] serenity::Error),
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_PRESENCES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Connects to the gateway and serves events until the connection ends or ctrl-c.
pub async fn run(token: &SecretString, dispatcher: EventDispatcher) -> Result<(), GatewayError> {
    let handler = GatewayHandler::new(dispatcher);
    let shard_slot = Arc::clone(&handler.shard_manager);

    let mut client = Client::builder(token.expose_secret(), gateway_intents())
        .event_handler(handler)
        .await
        .map_err(GatewayError::Client)?;

    let _ = shard_slot.set(Arc::clone(&client.shard_manager));
    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(event_name = "discord.gateway.shutdown", "ctrl-c received, closing shards");
            shard_manager.shutdown_all().await;
        }
    });

    info!(event_name = "discord.gateway.starting", "connecting to gateway");
    client.start().await.map_err(GatewayError::Connection)
}

pub struct GatewayHandler {
    dispatcher: EventDispatcher,
    shard_manager: Arc<OnceLock<Arc<ShardManager>>>,
}

impl GatewayHandler {
    pub fn new(dispatcher: EventDispatcher) -> Self {
        Self { dispatcher, shard_manager: Arc::new(OnceLock::new()) }
    }

    async fn latency_ms(&self, ctx: &Context) -> Option<u64> {
        let manager = self.shard_manager.get()?;
        let runners = manager.runners.lock().await;
        let latency = runners.get(&ctx.shard_id)?.latency?;
        Some(latency.as_millis() as u64)
    }

    async fn event_context(&self, ctx: &Context, correlation_id: String) -> EventContext {
        EventContext::new(correlation_id).with_latency(self.latency_ms(ctx).await)
    }

    async fn respond_to_command(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        result: HandlerResult,
    ) {
        let response = match result {
            HandlerResult::Responded(message) => {
                CreateInteractionResponse::Message(to_response_message(&message))
            }
            HandlerResult::Ignored => return,
        };
        if let Err(error) = command.create_response(&ctx.http, response).await {
            warn!(
                event_name = "discord.reply.failed",
                correlation_id = %command.id,
                error = %error,
                "failed to answer command"
            );
        }
    }

    async fn respond_to_component(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        result: HandlerResult,
    ) {
        let response = match result {
            HandlerResult::Responded(message) => {
                CreateInteractionResponse::Message(to_response_message(&message))
            }
            HandlerResult::Ignored => return,
        };
        if let Err(error) = component.create_response(&ctx.http, response).await {
            warn!(
                event_name = "discord.reply.failed",
                correlation_id = %component.id,
                error = %error,
                "failed to answer component"
            );
        }
    }
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let registrar = HttpRegistrar { http: Arc::clone(&ctx.http) };
        let event = LifecycleEvent::Ready {
            info: ReadyInfo {
                bot_user: ready.user.name.clone(),
                user_count: ctx.cache.user_count(),
                guild_count: ready.guilds.len(),
            },
            commands: self.dispatcher.registry().command_definitions(),
            registrar: &registrar,
        };
        self.dispatcher.fire(&event).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: GatewayInteraction) {
        match interaction {
            GatewayInteraction::Command(command) => {
                let invocation = Interaction::SlashCommand(command_invocation(&command));
                let event_ctx = self.event_context(&ctx, command.id.to_string()).await;
                let result = self.dispatcher.dispatch(&invocation, &event_ctx).await;
                self.respond_to_command(&ctx, &command, result).await;
            }
            GatewayInteraction::Component(component) => {
                let Some(invocation) = component_invocation(&component) else {
                    return;
                };
                let event_ctx = self.event_context(&ctx, component.id.to_string()).await;
                let result = self.dispatcher.dispatch(&invocation, &event_ctx).await;
                self.respond_to_component(&ctx, &component, result).await;
            }
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, message: Message) {
        let interaction = Interaction::TextMessage(TextMessage {
            message_id: message.id.to_string(),
            channel_id: message.channel_id.to_string(),
            guild_id: message.guild_id.map(|id| id.to_string()),
            author_id: message.author.id.to_string(),
            author_is_bot: message.author.bot,
            content: message.content.clone(),
        });
        let event_ctx = self.event_context(&ctx, message.id.to_string()).await;

        let HandlerResult::Responded(reply) =
            self.dispatcher.dispatch(&interaction, &event_ctx).await
        else {
            return;
        };
        let outgoing = to_channel_message(&reply);
        if let Err(error) = message.channel_id.send_message(&ctx.http, outgoing).await {
            warn!(
                event_name = "discord.reply.failed",
                correlation_id = %message.id,
                error = %error,
                "failed to answer text command"
            );
        }
    }
}

struct HttpRegistrar {
    http: Arc<Http>,
}

#[async_trait]
impl CommandRegistrar for HttpRegistrar {
    async fn register_global(&self, commands: &[CommandDefinition]) -> Result<usize, HandlerError> {
        let builders = commands.iter().map(to_create_command).collect::<Vec<_>>();
        let published = Command::set_global_commands(&self.http, builders)
            .await
            .map_err(|error| HandlerError::Gateway(error.to_string()))?;
        Ok(published.len())
    }
}

fn command_invocation(command: &CommandInteraction) -> CommandInvocation {
    let (subcommand, options) = flatten_options(&command.data.options);
    CommandInvocation {
        interaction_id: command.id.to_string(),
        name: command.data.name.clone(),
        subcommand,
        options,
        user_id: command.user.id.to_string(),
        channel_id: command.channel_id.to_string(),
        guild_id: command.guild_id.map(|id| id.to_string()),
    }
}

/// Lifts a single subcommand level; its options become the invocation's options.
fn flatten_options(options: &[CommandDataOption]) -> (Option<String>, Vec<CommandOption>) {
    if let Some(first) = options.first() {
        if let CommandDataOptionValue::SubCommand(nested) = &first.value {
            return (Some(first.name.clone()), convert_options(nested));
        }
    }
    (None, convert_options(options))
}

fn convert_options(options: &[CommandDataOption]) -> Vec<CommandOption> {
    options
        .iter()
        .filter_map(|option| {
            let value = match &option.value {
                CommandDataOptionValue::String(value) => OptionValue::String(value.clone()),
                CommandDataOptionValue::User(id) => OptionValue::User(id.to_string()),
                _ => return None,
            };
            Some(CommandOption { name: option.name.clone(), value })
        })
        .collect()
}

fn component_invocation(component: &ComponentInteraction) -> Option<Interaction> {
    let base = |values: Vec<String>| ComponentInvocation {
        interaction_id: component.id.to_string(),
        custom_id: component.data.custom_id.clone(),
        values,
        user_id: component.user.id.to_string(),
        channel_id: component.channel_id.to_string(),
        guild_id: component.guild_id.map(|id| id.to_string()),
    };
    match &component.data.kind {
        ComponentInteractionDataKind::Button => Some(Interaction::Button(base(Vec::new()))),
        ComponentInteractionDataKind::StringSelect { values } => {
            Some(Interaction::SelectMenu(base(values.clone())))
        }
        _ => None,
    }
}

pub fn to_create_command(definition: &CommandDefinition) -> CreateCommand {
    let mut command = CreateCommand::new(definition.name).description(definition.description);
    for option in &definition.options {
        command = command.add_option(to_create_option(option));
    }
    for subcommand in &definition.subcommands {
        let mut sub = CreateCommandOption::new(
            CommandOptionType::SubCommand,
            subcommand.name,
            subcommand.description,
        );
        for option in &subcommand.options {
            sub = sub.add_sub_option(to_create_option(option));
        }
        command = command.add_option(sub);
    }
    if definition.requires_manage_roles {
        command = command.default_member_permissions(Permissions::MANAGE_ROLES);
    }
    command
}

fn to_create_option(option: &OptionDefinition) -> CreateCommandOption {
    let kind = match option.kind {
        OptionKind::String => CommandOptionType::String,
        OptionKind::User => CommandOptionType::User,
    };
    CreateCommandOption::new(kind, option.name, option.description).required(option.required)
}

/// Replies render mentions without pinging anyone.
pub fn to_response_message(message: &MessageTemplate) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .content(message.content.clone())
        .ephemeral(message.ephemeral)
        .allowed_mentions(CreateAllowedMentions::new())
        .components(to_action_rows(&message.components))
}

pub fn to_channel_message(message: &MessageTemplate) -> CreateMessage {
    CreateMessage::new()
        .content(message.content.clone())
        .allowed_mentions(CreateAllowedMentions::new())
        .components(to_action_rows(&message.components))
}

fn to_action_rows(components: &[Component]) -> Vec<CreateActionRow> {
    components
        .iter()
        .map(|component| match component {
            Component::Buttons { buttons } => CreateActionRow::Buttons(
                buttons
                    .iter()
                    .map(|button| {
                        CreateButton::new(button.custom_id.clone())
                            .label(button.label.clone())
                            .style(match button.style {
                                ButtonStyle::Secondary => GatewayButtonStyle::Secondary,
                                ButtonStyle::Danger => GatewayButtonStyle::Danger,
                            })
                    })
                    .collect(),
            ),
            Component::SelectMenu { menu } => {
                let options = menu
                    .options
                    .iter()
                    .map(|option| {
                        CreateSelectMenuOption::new(option.label.clone(), option.value.clone())
                    })
                    .collect();
                let mut select = CreateSelectMenu::new(
                    menu.custom_id.clone(),
                    CreateSelectMenuKind::String { options },
                )
                .min_values(menu.min_values)
                .max_values(menu.max_values);
                if let Some(placeholder) = &menu.placeholder {
                    select = select.placeholder(placeholder.clone());
                }
                CreateActionRow::SelectMenu(select)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serenity::all::GatewayIntents;

    use helperbot_core::domain::helper::{HelperData, UserId};

    use super::{gateway_intents, to_channel_message, to_create_command, to_response_message};
    use crate::messages::{helpers_for_lang_message, role_removal_message, roles_overview_message};
    use crate::registry::{CommandDefinition, OptionDefinition, OptionKind, SubcommandDefinition};

    #[test]
    fn intents_include_message_content_and_members() {
        let intents = gateway_intents();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents.contains(GatewayIntents::GUILD_MEMBERS));
        assert!(intents.contains(GatewayIntents::GUILD_PRESENCES));
    }

    #[test]
    fn command_definition_maps_subcommands_and_permissions() {
        let definition = CommandDefinition::new("helper", "Manage helper roles")
            .subcommand(SubcommandDefinition {
                name: "roles",
                description: "Show roles",
                options: vec![OptionDefinition::required("user", "Member", OptionKind::User)],
            })
            .manage_roles();

        let json = serde_json::to_value(to_create_command(&definition)).expect("serialize");

        assert_eq!(json["name"], "helper");
        assert_eq!(json["options"][0]["name"], "roles");
        assert_eq!(json["options"][0]["options"][0]["name"], "user");
        assert!(json.get("default_member_permissions").is_some_and(|value| !value.is_null()));
    }

    #[test]
    fn ephemeral_reply_keeps_components() {
        let json = serde_json::to_value(to_response_message(&roles_overview_message(
            "42",
            &["en".to_owned()],
        )))
        .expect("serialize");

        assert_eq!(json["flags"], 64);
        assert_eq!(json["components"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn plain_reply_has_content() {
        let json = serde_json::to_value(to_response_message(&role_removal_message(&[], &[])))
            .expect("serialize");
        assert!(json["content"].as_str().is_some_and(|content| content.contains("None")));
    }

    fn helpers() -> Vec<HelperData> {
        vec![HelperData::new(UserId("1".to_owned())), HelperData::new(UserId("2".to_owned()))]
    }

    #[test]
    fn helpers_slash_reply_does_not_ping() {
        let message = helpers_for_lang_message("en", &helpers());
        let json = serde_json::to_value(to_response_message(&message)).expect("serialize");

        assert!(json["content"].as_str().is_some_and(|content| content.contains("<@1>, <@2>")));
        assert!(json["allowed_mentions"]["parse"].as_array().is_some_and(Vec::is_empty));
        assert!(json["allowed_mentions"]["users"].as_array().map_or(true, Vec::is_empty));
    }

    #[test]
    fn helpers_text_reply_does_not_ping() {
        let message = helpers_for_lang_message("en", &helpers());
        let json = serde_json::to_value(to_channel_message(&message)).expect("serialize");

        assert!(json["content"].as_str().is_some_and(|content| content.contains("<@1>, <@2>")));
        assert!(json["allowed_mentions"]["parse"].as_array().is_some_and(Vec::is_empty));
        assert!(json["allowed_mentions"]["users"].as_array().map_or(true, Vec::is_empty));
    }
}
