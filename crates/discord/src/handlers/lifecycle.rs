use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use helperbot_core::config::Environment;
use helperbot_db::{CacheStore, HelperRepository};

use crate::events::{HandlerError, LifecycleEvent, LifecycleEventKind};
use crate::registry::LifecycleHandler;

/// First ready event: publish slash commands, then rebuild the local mirror.
pub struct ReadyHandler {
    helpers: Arc<dyn HelperRepository>,
    cache: Arc<CacheStore>,
    environment: Environment,
}

impl ReadyHandler {
    pub fn new(
        helpers: Arc<dyn HelperRepository>,
        cache: Arc<CacheStore>,
        environment: Environment,
    ) -> Self {
        Self { helpers, cache, environment }
    }
}

#[async_trait]
impl LifecycleHandler for ReadyHandler {
    fn event(&self) -> LifecycleEventKind {
        LifecycleEventKind::Ready
    }

    fn once(&self) -> bool {
        true
    }

    async fn handle(&self, event: &LifecycleEvent<'_>) -> Result<(), HandlerError> {
        let LifecycleEvent::Ready { info, commands, registrar } = event;
        info!(
            event_name = "discord.ready",
            bot_user = %info.bot_user,
            users = info.user_count,
            guilds = info.guild_count,
            environment = %self.environment,
            "logged in to gateway"
        );

        // A failed publish leaves the previously published commands in place.
        match registrar.register_global(commands).await {
            Ok(count) => info!(event_name = "discord.commands.registered", count),
            Err(source) => error!(
                event_name = "discord.commands.register_failed",
                error = %source,
                "publishing slash commands failed"
            ),
        }

        self.cache.reset().await?;
        let elapsed = self.cache.sync(self.helpers.as_ref()).await?;

        let primary_rows = self.helpers.count().await?;
        let mirror_rows = self.cache.row_counts().await?;
        info!(
            event_name = "cache.ready",
            elapsed_ms = elapsed.as_millis() as u64,
            primary_rows,
            mirror_rows = ?mirror_rows,
            "cache synchronized in {:.2}s",
            elapsed.as_secs_f64()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use helperbot_core::config::Environment;

    use super::ReadyHandler;
    use crate::events::{CommandRegistrar, HandlerError, LifecycleEvent, ReadyInfo};
    use crate::handlers::test_support::{cache, helper, primary};
    use crate::registry::{CommandDefinition, LifecycleHandler};

    #[derive(Default)]
    struct RecordingRegistrar {
        published: AtomicUsize,
    }

    #[async_trait]
    impl CommandRegistrar for RecordingRegistrar {
        async fn register_global(
            &self,
            commands: &[CommandDefinition],
        ) -> Result<usize, HandlerError> {
            self.published.fetch_add(commands.len(), Ordering::SeqCst);
            Ok(commands.len())
        }
    }

    struct RejectingRegistrar;

    #[async_trait]
    impl CommandRegistrar for RejectingRegistrar {
        async fn register_global(
            &self,
            _commands: &[CommandDefinition],
        ) -> Result<usize, HandlerError> {
            Err(HandlerError::Gateway("401 Unauthorized".to_owned()))
        }
    }

    fn ready<'a>(registrar: &'a dyn CommandRegistrar) -> LifecycleEvent<'a> {
        LifecycleEvent::Ready {
            info: ReadyInfo { bot_user: "helperbot#0001".to_owned(), user_count: 10, guild_count: 1 },
            commands: vec![
                CommandDefinition::new("ping", "ping"),
                CommandDefinition::new("helpers", "helpers"),
            ],
            registrar,
        }
    }

    #[tokio::test]
    async fn ready_publishes_commands_and_mirrors_primary() {
        let repo = primary(vec![helper("1", &["en"]), helper("2", &["fr", "de"])]);
        let cache = cache().await;
        let handler = ReadyHandler::new(repo, Arc::clone(&cache), Environment::Development);
        let registrar = RecordingRegistrar::default();

        handler.handle(&ready(&registrar)).await.expect("ready");

        assert_eq!(registrar.published.load(Ordering::SeqCst), 2);
        assert_eq!(cache.row_counts().await.expect("counts"), vec![("helpers", 2)]);
    }

    #[tokio::test]
    async fn registration_failure_does_not_block_the_sync() {
        let cache = cache().await;
        let handler =
            ReadyHandler::new(primary(vec![helper("1", &["en"])]), Arc::clone(&cache), Environment::Production);

        handler.handle(&ready(&RejectingRegistrar)).await.expect("ready");

        assert_eq!(cache.row_counts().await.expect("counts"), vec![("helpers", 1)]);
    }

    #[tokio::test]
    async fn ready_handler_runs_once() {
        let handler = ReadyHandler::new(primary(Vec::new()), cache().await, Environment::Production);
        assert!(handler.once());
    }
}
