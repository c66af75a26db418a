use std::path::{Path, PathBuf};
use std::sync::Arc;

use helperbot_core::config::{AppConfig, ConfigError, LoadOptions};
use helperbot_db::{
    connect_primary, migrations, CacheError, CacheStore, HelperRepository, PrimaryPool,
    SqlHelperRepository,
};
use helperbot_discord::{default_registry, EventDispatcher};
use thiserror::Error;
use tracing::info;

use crate::boot;

pub struct Application {
    pub config: AppConfig,
    pub primary: PrimaryPool,
    pub cache: Arc<CacheStore>,
    pub dispatcher: EventDispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("primary store connection failed: {0}")]
    PrimaryConnect(#[source] sqlx::Error),
    #[error("primary store migration failed: {0}")]
    PrimaryMigration(#[source] sqlx::migrate::MigrateError),
    #[error("cache store unavailable: {0}")]
    Cache(#[source] CacheError),
}

/// Primary store first, then the cache; both must be up before the gateway starts.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = boot::init(options)?;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = %config.environment(),
        "starting application bootstrap"
    );

    let primary = connect_primary(
        config.credentials(),
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::PrimaryConnect)?;
    info!(
        event_name = "system.bootstrap.primary_connected",
        correlation_id = "bootstrap",
        "primary store connection established"
    );

    migrations::run_primary(&primary).await.map_err(BootstrapError::PrimaryMigration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "primary store migrations applied"
    );

    let cache_path = config.cache.resolve_path(&install_dir());
    let cache = CacheStore::open(&cache_path, config.cache.max_connections)
        .await
        .map_err(BootstrapError::Cache)?;
    info!(
        event_name = "system.bootstrap.cache_opened",
        correlation_id = "bootstrap",
        path = %cache_path.display(),
        "cache store opened"
    );

    let cache = Arc::new(cache);
    let helpers: Arc<dyn HelperRepository> = Arc::new(SqlHelperRepository::new(primary.clone()));
    let dispatcher = assemble(&config, helpers, Arc::clone(&cache));

    Ok(Application { config, primary, cache, dispatcher })
}

/// Wires the handler registry to its stores.
pub fn assemble(
    config: &AppConfig,
    helpers: Arc<dyn HelperRepository>,
    cache: Arc<CacheStore>,
) -> EventDispatcher {
    let prefix = config.discord.text_command_prefix.as_str();
    let registry = default_registry(helpers, cache, config.environment(), prefix);
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        commands = registry.commands.len(),
        text_commands = registry.text_commands.len(),
        buttons = registry.buttons.len(),
        menus = registry.menus.len(),
        lifecycle = registry.lifecycle_count(),
        "handler registry built"
    );
    EventDispatcher::new(Arc::new(registry), prefix)
}

/// Directory of the running binary; relative cache paths resolve against it.
fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use helperbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use helperbot_core::domain::helper::{HelperData, UserId};
    use helperbot_db::{CacheStore, InMemoryHelperRepository};
    use helperbot_discord::interactions::{ComponentInvocation, Interaction};
    use helperbot_discord::{EventContext, HandlerResult};

    use super::{assemble, bootstrap, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some("Bot abc".to_string()),
                database_url: Some("mysql://localhost:3306/helperbot".to_string()),
                database_user: Some("helperbot".to_string()),
                database_password: Some("secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn assembled_dispatcher_serves_the_roles_menu() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache =
            Arc::new(CacheStore::open(&dir.path().join("cache.sqlite"), 1).await.expect("cache"));
        let mut helper = HelperData::new(UserId("12345".to_string()));
        helper.langs = vec!["en".to_string()];
        let helpers = Arc::new(InMemoryHelperRepository::with_helpers([helper]));

        let dispatcher = assemble(&AppConfig::default(), helpers, cache);
        let result = dispatcher
            .dispatch(
                &Interaction::SelectMenu(ComponentInvocation {
                    interaction_id: "i-1".to_string(),
                    custom_id: "lroles-12345".to_string(),
                    values: vec!["en".to_string()],
                    user_id: "1".to_string(),
                    channel_id: "C1".to_string(),
                    guild_id: None,
                }),
                &EventContext::new("i-1"),
            )
            .await;

        let HandlerResult::Responded(message) = result else {
            panic!("expected a reply");
        };
        assert!(message.content.ends_with("**Remaining roles:** None"));
    }

    #[tokio::test]
    async fn cache_file_is_created_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.sqlite");

        CacheStore::open(&path, 1).await.expect("cache");

        assert!(path.exists());
    }
}
