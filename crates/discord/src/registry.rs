use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::events::{EventContext, HandlerError, HandlerResult, LifecycleEvent, LifecycleEventKind};
use crate::interactions::{CommandInvocation, ComponentInvocation, TextCommandInvocation, TextMessage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionKind {
    String,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
    pub required: bool,
}

impl OptionDefinition {
    pub fn required(name: &'static str, description: &'static str, kind: OptionKind) -> Self {
        Self { name, description, kind, required: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubcommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<OptionDefinition>,
}

/// Shape of a slash command as published to Discord.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<OptionDefinition>,
    pub subcommands: Vec<SubcommandDefinition>,
    /// Restricts the command to members holding the Manage Roles permission.
    pub requires_manage_roles: bool,
}

impl CommandDefinition {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            options: Vec::new(),
            subcommands: Vec::new(),
            requires_manage_roles: false,
        }
    }

    pub fn option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, subcommand: SubcommandDefinition) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    pub fn manage_roles(mut self) -> Self {
        self.requires_manage_roles = true;
        self
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn definition(&self) -> CommandDefinition;

    async fn execute(
        &self,
        command: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError>;
}

#[async_trait]
pub trait TextCommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        command: &TextCommandInvocation,
        message: &TextMessage,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError>;
}

/// Handles button presses whose custom id starts with `name()`.
#[async_trait]
pub trait ButtonHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        component: &ComponentInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError>;
}

/// Handles select-menu submissions whose custom id starts with `name()`.
#[async_trait]
pub trait MenuHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        component: &ComponentInvocation,
        ctx: &EventContext,
    ) -> Result<HandlerResult, HandlerError>;
}

#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    fn event(&self) -> LifecycleEventKind;

    /// `true` detaches the handler after its first run.
    fn once(&self) -> bool {
        false
    }

    async fn handle(&self, event: &LifecycleEvent<'_>) -> Result<(), HandlerError>;
}

/// Name-keyed handler table. Registering a name twice keeps the later handler.
pub struct Registry<H: ?Sized> {
    kind: &'static str,
    handlers: BTreeMap<String, Arc<H>>,
}

impl<H: ?Sized> Registry<H> {
    fn new(kind: &'static str) -> Self {
        Self { kind, handlers: BTreeMap::new() }
    }

    fn insert(&mut self, name: &str, handler: Arc<H>) {
        if self.handlers.insert(name.to_owned(), handler).is_some() {
            warn!(
                event_name = "discord.registry.handler_replaced",
                kind = self.kind,
                name,
                "handler name registered twice, keeping the later registration"
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<H>> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub struct LifecycleEntry {
    handler: Arc<dyn LifecycleHandler>,
    once: bool,
    fired: AtomicBool,
}

impl LifecycleEntry {
    pub fn handler(&self) -> &Arc<dyn LifecycleHandler> {
        &self.handler
    }

    /// Whether the handler should run for this occurrence. Once-handlers win exactly one claim.
    pub fn claim(&self) -> bool {
        !self.once || !self.fired.swap(true, Ordering::SeqCst)
    }
}

/// Every handler the bot knows, built once at startup and shared read-only.
pub struct HandlerRegistry {
    pub commands: Registry<dyn CommandHandler>,
    pub text_commands: Registry<dyn TextCommandHandler>,
    pub buttons: Registry<dyn ButtonHandler>,
    pub menus: Registry<dyn MenuHandler>,
    lifecycle: Vec<LifecycleEntry>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn command_definitions(&self) -> Vec<CommandDefinition> {
        self.commands.handlers.values().map(|handler| handler.definition()).collect()
    }

    pub fn lifecycle_for(&self, kind: LifecycleEventKind) -> impl Iterator<Item = &LifecycleEntry> {
        self.lifecycle.iter().filter(move |entry| entry.handler.event() == kind)
    }

    pub fn lifecycle_count(&self) -> usize {
        self.lifecycle.len()
    }
}

pub struct HandlerRegistryBuilder {
    registry: HandlerRegistry,
}

impl Default for HandlerRegistryBuilder {
    fn default() -> Self {
        Self {
            registry: HandlerRegistry {
                commands: Registry::new("command"),
                text_commands: Registry::new("text_command"),
                buttons: Registry::new("button"),
                menus: Registry::new("menu"),
                lifecycle: Vec::new(),
            },
        }
    }
}

impl HandlerRegistryBuilder {
    pub fn command<H>(mut self, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        let name = handler.definition().name;
        self.registry.commands.insert(name, Arc::new(handler));
        self
    }

    pub fn text_command<H>(mut self, handler: H) -> Self
    where
        H: TextCommandHandler + 'static,
    {
        let name = handler.name();
        self.registry.text_commands.insert(name, Arc::new(handler));
        self
    }

    pub fn button<H>(mut self, handler: H) -> Self
    where
        H: ButtonHandler + 'static,
    {
        let name = handler.name();
        self.registry.buttons.insert(name, Arc::new(handler));
        self
    }

    pub fn menu<H>(mut self, handler: H) -> Self
    where
        H: MenuHandler + 'static,
    {
        let name = handler.name();
        self.registry.menus.insert(name, Arc::new(handler));
        self
    }

    pub fn lifecycle<H>(mut self, handler: H) -> Self
    where
        H: LifecycleHandler + 'static,
    {
        let once = handler.once();
        self.registry.lifecycle.push(LifecycleEntry {
            handler: Arc::new(handler),
            once,
            fired: AtomicBool::new(false),
        });
        self
    }

    pub fn build(self) -> HandlerRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{ButtonHandler, HandlerRegistry};
    use crate::events::{EventContext, HandlerError, HandlerResult};
    use crate::interactions::ComponentInvocation;
    use crate::messages::MessageBuilder;

    struct Labelled(&'static str);

    #[async_trait]
    impl ButtonHandler for Labelled {
        fn name(&self) -> &'static str {
            "confirm"
        }

        async fn execute(
            &self,
            _component: &ComponentInvocation,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, HandlerError> {
            Ok(HandlerResult::Responded(MessageBuilder::new(self.0).build()))
        }
    }

    #[test]
    fn duplicate_names_keep_one_entry() {
        let registry =
            HandlerRegistry::builder().button(Labelled("first")).button(Labelled("second")).build();

        assert_eq!(registry.buttons.len(), 1);
        assert_eq!(registry.buttons.names().collect::<Vec<_>>(), vec!["confirm"]);
    }

    #[test]
    fn empty_registry_has_no_handlers() {
        let registry = HandlerRegistry::builder().build();
        assert!(registry.commands.is_empty());
        assert!(registry.menus.get("lroles").is_none());
        assert_eq!(registry.lifecycle_count(), 0);
    }
}
