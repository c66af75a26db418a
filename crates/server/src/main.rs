mod boot;
mod bootstrap;

use anyhow::Result;
use helperbot_core::config::LoadOptions;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(
            event_name = "system.bootstrap.fatal",
            correlation_id = "bootstrap",
            error = %format!("{error:#}"),
            "helperbot stopped with a fatal error"
        );
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let app = bootstrap::bootstrap(LoadOptions::default()).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        environment = %app.config.environment(),
        "helperbot started, connecting to Discord"
    );
    let outcome = helperbot_discord::run(&app.config.discord.token, app.dispatcher.clone()).await;

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "helperbot stopping");
    app.cache.pool().close().await;
    app.primary.close().await;

    outcome?;
    Ok(())
}
