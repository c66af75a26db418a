//! Concrete handlers and the startup registration table that wires them.

use std::sync::Arc;

use helperbot_core::config::Environment;
use helperbot_db::{CacheStore, HelperRepository};

use crate::registry::HandlerRegistry;

pub mod buttons;
pub mod commands;
pub mod lifecycle;
pub mod menus;
pub mod text_commands;

pub use buttons::ClearRolesButton;
pub use commands::{HelperCommand, HelpersCommand, PingCommand};
pub use lifecycle::ReadyHandler;
pub use menus::RolesMenu;
pub use text_commands::{HelpTextCommand, HelpersTextCommand};

/// Builds the registry with every handler the bot ships.
pub fn default_registry(
    helpers: Arc<dyn HelperRepository>,
    cache: Arc<CacheStore>,
    environment: Environment,
    text_command_prefix: &str,
) -> HandlerRegistry {
    HandlerRegistry::builder()
        .command(HelperCommand::new(Arc::clone(&helpers)))
        .command(HelpersCommand::new(Arc::clone(&cache)))
        .command(PingCommand)
        .text_command(HelpersTextCommand::new(Arc::clone(&cache)))
        .text_command(HelpTextCommand::new(text_command_prefix))
        .button(ClearRolesButton::new(Arc::clone(&helpers)))
        .menu(RolesMenu::new(Arc::clone(&helpers)))
        .lifecycle(ReadyHandler::new(helpers, cache, environment))
        .build()
}
