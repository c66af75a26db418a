use std::env;
use std::path::PathBuf;
use std::sync::Once;

use helperbot_core::config::{AppConfig, ConfigError, Environment, LoadOptions, LogFormat};
use tracing::{debug, Level};

static DOTENV: Once = Once::new();
static LOGGING: Once = Once::new();

/// Loads `.env`, then configuration, and installs the tracing subscriber.
///
/// Repeated calls re-read configuration but never reload `.env` or replace the subscriber.
/// When configuration fails a default subscriber is installed so the failure can be logged.
pub fn init(options: LoadOptions) -> Result<AppConfig, ConfigError> {
    let dotenv_path = load_dotenv();

    let config = match environment().and_then(|_| AppConfig::load(options)) {
        Ok(config) => config,
        Err(error) => {
            init_logging(&AppConfig::default());
            return Err(error);
        }
    };
    init_logging(&config);

    if let Some(path) = dotenv_path {
        debug!(event_name = "system.boot.dotenv_loaded", path = %path.display());
    }
    Ok(config)
}

/// Deployment environment from `ENVIRONMENT`; unset means production.
pub fn environment() -> Result<Environment, ConfigError> {
    match env::var("ENVIRONMENT") {
        Ok(value) if !value.trim().is_empty() => value.parse(),
        _ => Ok(Environment::Production),
    }
}

fn load_dotenv() -> Option<PathBuf> {
    let mut loaded = None;
    DOTENV.call_once(|| loaded = dotenvy::dotenv().ok());
    loaded
}

fn init_logging(config: &AppConfig) {
    LOGGING.call_once(|| {
        let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
        let builder = tracing_subscriber::fmt().with_target(false).with_max_level(level);

        // try_init: a subscriber installed by an embedding test harness wins.
        let _ = match config.logging.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
    });
}
