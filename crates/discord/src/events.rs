use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info};

use helperbot_core::errors::{ApplicationError, DomainError};
use helperbot_db::{CacheError, RepositoryError};

use crate::interactions::{parse_custom_id, parse_text_command, Interaction, InteractionKind};
use crate::messages::{error_message, MessageTemplate};
use crate::registry::{CommandDefinition, HandlerRegistry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
    /// Last measured gateway heartbeat latency, when the shard has one.
    pub latency_ms: Option<u64>,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), latency_ms: None }
    }

    pub fn with_latency(mut self, latency_ms: Option<u64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new("unknown-correlation-id")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Ignored,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),
    #[error("gateway request failed: {0}")]
    Gateway(String),
}

impl HandlerError {
    pub fn into_application(self) -> ApplicationError {
        match self {
            Self::Domain(error) => ApplicationError::Domain(error),
            Self::MissingOption(name) => ApplicationError::Domain(DomainError::InvariantViolation(
                format!("missing required option `{name}`"),
            )),
            Self::Repository(error) => ApplicationError::Persistence(error.to_string()),
            Self::Cache(error) => ApplicationError::Persistence(error.to_string()),
            Self::Gateway(message) => ApplicationError::Integration(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{kind:?} handler `{key}` failed: {source}")]
    Handler {
        kind: InteractionKind,
        key: String,
        #[source]
        source: HandlerError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    Ready,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyInfo {
    pub bot_user: String,
    pub user_count: usize,
    pub guild_count: usize,
}

/// Publishes slash command definitions to the gateway.
#[async_trait]
pub trait CommandRegistrar: Send + Sync {
    async fn register_global(&self, commands: &[CommandDefinition]) -> Result<usize, HandlerError>;
}

pub enum LifecycleEvent<'a> {
    Ready { info: ReadyInfo, commands: Vec<CommandDefinition>, registrar: &'a dyn CommandRegistrar },
}

impl LifecycleEvent<'_> {
    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            Self::Ready { .. } => LifecycleEventKind::Ready,
        }
    }
}

/// Routes inbound interactions to the registered handler for their key.
///
/// Handler failures never escape: they are logged and turned into an ephemeral
/// failure reply carrying the interaction's correlation id.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<HandlerRegistry>,
    text_command_prefix: String,
}

impl EventDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, text_command_prefix: impl Into<String>) -> Self {
        Self { registry, text_command_prefix: text_command_prefix.into() }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, interaction: &Interaction, ctx: &EventContext) -> HandlerResult {
        match self.try_dispatch(interaction, ctx).await {
            Ok(result) => result,
            Err(DispatchError::Handler { kind, key, source }) => {
                error!(
                    event_name = "discord.dispatch.handler_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = interaction.user_id(),
                    kind = ?kind,
                    key = %key,
                    error = %source,
                    "interaction handler failed"
                );
                let interface = source.into_application().into_interface(&ctx.correlation_id);
                HandlerResult::Responded(error_message(
                    interface.user_message(),
                    interface.correlation_id(),
                ))
            }
        }
    }

    pub async fn try_dispatch(
        &self,
        interaction: &Interaction,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let kind = interaction.kind();
        let (key, outcome) = match interaction {
            Interaction::SlashCommand(command) => {
                let Some(handler) = self.registry.commands.get(&command.name) else {
                    return Ok(self.unrouted(kind, &command.name, ctx));
                };
                (command.name.clone(), handler.execute(command, ctx).await)
            }
            Interaction::Button(component) => {
                let prefix = parse_custom_id(&component.custom_id).prefix;
                let Some(handler) = self.registry.buttons.get(prefix) else {
                    return Ok(self.unrouted(kind, prefix, ctx));
                };
                (prefix.to_owned(), handler.execute(component, ctx).await)
            }
            Interaction::SelectMenu(component) => {
                let prefix = parse_custom_id(&component.custom_id).prefix;
                let Some(handler) = self.registry.menus.get(prefix) else {
                    return Ok(self.unrouted(kind, prefix, ctx));
                };
                (prefix.to_owned(), handler.execute(component, ctx).await)
            }
            Interaction::TextMessage(message) => {
                if message.author_is_bot {
                    return Ok(HandlerResult::Ignored);
                }
                let Some(command) = parse_text_command(&self.text_command_prefix, &message.content)
                else {
                    return Ok(HandlerResult::Ignored);
                };
                let Some(handler) = self.registry.text_commands.get(&command.name) else {
                    return Ok(self.unrouted(kind, &command.name, ctx));
                };
                let outcome = handler.execute(&command, message, ctx).await;
                (command.name, outcome)
            }
        };

        outcome.map_err(|source| DispatchError::Handler { kind, key, source })
    }

    /// Runs every lifecycle handler registered for the event and returns how many ran.
    /// Failures are logged; later handlers still run.
    pub async fn fire(&self, event: &LifecycleEvent<'_>) -> usize {
        let mut ran = 0;
        for entry in self.registry.lifecycle_for(event.kind()) {
            if !entry.claim() {
                continue;
            }
            ran += 1;
            if let Err(source) = entry.handler().handle(event).await {
                error!(
                    event_name = "discord.lifecycle.handler_failed",
                    event = ?event.kind(),
                    error = %source,
                    "lifecycle handler failed"
                );
            }
        }
        info!(event_name = "discord.lifecycle.fired", event = ?event.kind(), handlers = ran);
        ran
    }

    fn unrouted(&self, kind: InteractionKind, key: &str, ctx: &EventContext) -> HandlerResult {
        debug!(
            event_name = "discord.dispatch.unrouted",
            correlation_id = %ctx.correlation_id,
            kind = ?kind,
            key,
            "no handler registered for key"
        );
        HandlerResult::Ignored
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use helperbot_core::errors::DomainError;

    use super::{
        CommandRegistrar, EventContext, EventDispatcher, HandlerError, HandlerResult,
        LifecycleEvent, LifecycleEventKind, ReadyInfo,
    };
    use crate::interactions::{
        CommandInvocation, ComponentInvocation, Interaction, TextCommandInvocation, TextMessage,
    };
    use crate::messages::MessageBuilder;
    use crate::registry::{
        CommandDefinition, CommandHandler, HandlerRegistry, LifecycleHandler, MenuHandler,
        TextCommandHandler,
    };

    struct Reply {
        name: &'static str,
        text: &'static str,
    }

    #[async_trait]
    impl CommandHandler for Reply {
        fn definition(&self) -> CommandDefinition {
            CommandDefinition::new(self.name, "test command")
        }

        async fn execute(
            &self,
            _command: &CommandInvocation,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, HandlerError> {
            Ok(HandlerResult::Responded(MessageBuilder::new(self.text).build()))
        }
    }

    #[async_trait]
    impl TextCommandHandler for Reply {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(
            &self,
            _command: &TextCommandInvocation,
            _message: &TextMessage,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, HandlerError> {
            Ok(HandlerResult::Responded(MessageBuilder::new(self.text).build()))
        }
    }

    struct Failing;

    #[async_trait]
    impl MenuHandler for Failing {
        fn name(&self) -> &'static str {
            "lroles"
        }

        async fn execute(
            &self,
            component: &ComponentInvocation,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, HandlerError> {
            Err(DomainError::InvalidUserId(component.custom_id.clone()).into())
        }
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
        once: bool,
    }

    #[async_trait]
    impl LifecycleHandler for Counting {
        fn event(&self) -> LifecycleEventKind {
            LifecycleEventKind::Ready
        }

        fn once(&self) -> bool {
            self.once
        }

        async fn handle(&self, _event: &LifecycleEvent<'_>) -> Result<(), HandlerError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoopRegistrar;

    #[async_trait]
    impl CommandRegistrar for NoopRegistrar {
        async fn register_global(
            &self,
            commands: &[CommandDefinition],
        ) -> Result<usize, HandlerError> {
            Ok(commands.len())
        }
    }

    fn slash(name: &str) -> Interaction {
        Interaction::SlashCommand(CommandInvocation {
            interaction_id: "i-1".to_owned(),
            name: name.to_owned(),
            subcommand: None,
            options: Vec::new(),
            user_id: "7".to_owned(),
            channel_id: "C1".to_owned(),
            guild_id: None,
        })
    }

    fn text(content: &str, author_is_bot: bool) -> Interaction {
        Interaction::TextMessage(TextMessage {
            message_id: "m-1".to_owned(),
            channel_id: "C1".to_owned(),
            guild_id: None,
            author_id: "7".to_owned(),
            author_is_bot,
            content: content.to_owned(),
        })
    }

    fn dispatcher(registry: HandlerRegistry) -> EventDispatcher {
        EventDispatcher::new(Arc::new(registry), "!")
    }

    fn content(result: HandlerResult) -> String {
        match result {
            HandlerResult::Responded(message) => message.content,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn later_registration_with_same_name_wins() {
        let dispatcher = dispatcher(
            HandlerRegistry::builder()
                .command(Reply { name: "ping", text: "first" })
                .command(Reply { name: "ping", text: "second" })
                .build(),
        );

        let result = dispatcher.dispatch(&slash("ping"), &EventContext::default()).await;
        assert_eq!(content(result), "second");
    }

    #[tokio::test]
    async fn unknown_command_is_ignored() {
        let dispatcher = dispatcher(HandlerRegistry::builder().build());
        let result = dispatcher.dispatch(&slash("nope"), &EventContext::default()).await;
        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn text_commands_route_by_first_token() {
        let dispatcher = dispatcher(
            HandlerRegistry::builder().text_command(Reply { name: "help", text: "usage" }).build(),
        );

        let routed = dispatcher.dispatch(&text("!HELP me", false), &EventContext::default()).await;
        assert_eq!(content(routed), "usage");

        let from_bot = dispatcher.dispatch(&text("!help", true), &EventContext::default()).await;
        assert_eq!(from_bot, HandlerResult::Ignored);

        let chatter = dispatcher.dispatch(&text("help", false), &EventContext::default()).await;
        assert_eq!(chatter, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn handler_failure_becomes_ephemeral_reply() {
        let dispatcher = dispatcher(HandlerRegistry::builder().menu(Failing).build());
        let interaction = Interaction::SelectMenu(ComponentInvocation {
            interaction_id: "i-9".to_owned(),
            custom_id: "lroles-abc".to_owned(),
            values: vec!["en".to_owned()],
            user_id: "7".to_owned(),
            channel_id: "C1".to_owned(),
            guild_id: None,
        });

        let result = dispatcher.dispatch(&interaction, &EventContext::new("i-9")).await;
        let HandlerResult::Responded(message) = result else {
            panic!("expected failure reply");
        };
        assert!(message.ephemeral);
        assert!(message.content.contains("could not be processed"));
        assert!(message.content.contains("i-9"));
    }

    #[tokio::test]
    async fn once_handlers_fire_a_single_time() {
        let once_runs = Arc::new(AtomicUsize::new(0));
        let every_runs = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(
            HandlerRegistry::builder()
                .lifecycle(Counting { runs: Arc::clone(&once_runs), once: true })
                .lifecycle(Counting { runs: Arc::clone(&every_runs), once: false })
                .build(),
        );
        let registrar = NoopRegistrar;

        for _ in 0..3 {
            let event = LifecycleEvent::Ready {
                info: ReadyInfo { bot_user: "bot".to_owned(), user_count: 0, guild_count: 0 },
                commands: Vec::new(),
                registrar: &registrar,
            };
            dispatcher.fire(&event).await;
        }

        assert_eq!(once_runs.load(Ordering::SeqCst), 1);
        assert_eq!(every_runs.load(Ordering::SeqCst), 3);
    }
}
