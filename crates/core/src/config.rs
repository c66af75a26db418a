use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub discord: DiscordConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub text_command_prefix: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub development: DatabaseCredentials,
    pub production: DatabaseCredentials,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DatabaseCredentials {
    pub url: String,
    pub user: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub environment: Option<Environment>,
    pub discord_token: Option<String>,
    pub database_url: Option<String>,
    pub database_user: Option<String>,
    pub database_password: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            discord: DiscordConfig {
                token: String::new().into(),
                text_command_prefix: "!".to_string(),
            },
            database: DatabaseConfig {
                development: DatabaseCredentials::empty(),
                production: DatabaseCredentials::empty(),
                max_connections: 5,
                timeout_secs: 30,
            },
            cache: CacheConfig { path: PathBuf::from("cache.sqlite"), max_connections: 4 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl DatabaseCredentials {
    fn empty() -> Self {
        Self { url: String::new(), user: String::new(), password: String::new().into() }
    }
}

impl CacheConfig {
    /// Relative cache paths are anchored at the install directory, not the working directory.
    pub fn resolve_path(&self, install_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            install_dir.join(&self.path)
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unsupported environment `{other}` (expected development|production)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("helperbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Credential triple for the active environment.
    pub fn credentials(&self) -> &DatabaseCredentials {
        match self.environment {
            Environment::Development => &self.database.development,
            Environment::Production => &self.database.production,
        }
    }

    fn credentials_mut(&mut self) -> &mut DatabaseCredentials {
        match self.environment {
            Environment::Development => &mut self.database.development,
            Environment::Production => &mut self.database.production,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(environment) = patch.environment {
            self.environment = environment;
        }

        if let Some(discord) = patch.discord {
            if let Some(discord_token_value) = discord.token {
                self.discord.token = secret_value(discord_token_value);
            }
            if let Some(prefix) = discord.text_command_prefix {
                self.discord.text_command_prefix = prefix;
            }
        }

        if let Some(database) = patch.database {
            if let Some(development) = database.development {
                development.apply_to(&mut self.database.development);
            }
            if let Some(production) = database.production {
                production.apply_to(&mut self.database.production);
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(path) = cache.path {
                self.cache.path = path;
            }
            if let Some(max_connections) = cache.max_connections {
                self.cache.max_connections = max_connections;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ENVIRONMENT") {
            self.environment = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "ENVIRONMENT".to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(value) = read_env("DISCORD_TOKEN") {
            self.discord.token = secret_value(value);
        }
        if let Some(value) = read_env("HELPERBOT_TEXT_COMMAND_PREFIX") {
            self.discord.text_command_prefix = value;
        }

        apply_credential_env(&mut self.database.development, "DEV");
        apply_credential_env(&mut self.database.production, "PROD");
        if let Some(value) = read_env("HELPERBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("HELPERBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HELPERBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HELPERBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HELPERBOT_CACHE_PATH") {
            self.cache.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPERBOT_CACHE_MAX_CONNECTIONS") {
            self.cache.max_connections = parse_u32("HELPERBOT_CACHE_MAX_CONNECTIONS", &value)?;
        }

        let log_level =
            read_env("HELPERBOT_LOGGING_LEVEL").or_else(|| read_env("HELPERBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HELPERBOT_LOGGING_FORMAT").or_else(|| read_env("HELPERBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        // Credential overrides always target the environment selected above.
        if let Some(database_url) = overrides.database_url {
            self.credentials_mut().url = database_url;
        }
        if let Some(database_user) = overrides.database_user {
            self.credentials_mut().user = database_user;
        }
        if let Some(database_password) = overrides.database_password {
            self.credentials_mut().password = secret_value(database_password);
        }
        if let Some(cache_path) = overrides.cache_path {
            self.cache.path = cache_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_database(&self.database, self.environment)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn apply_credential_env(credentials: &mut DatabaseCredentials, suffix: &str) {
    if let Some(value) = read_env(&format!("DATABASE_URL_{suffix}")) {
        credentials.url = value;
    }
    if let Some(value) = read_env(&format!("DATABASE_USER_{suffix}")) {
        credentials.user = value;
    }
    if let Some(value) = read_env(&format!("DATABASE_PW_{suffix}")) {
        credentials.password = secret_value(value);
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helperbot.toml"), PathBuf::from("config/helperbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let token = discord.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Set DISCORD_TOKEN to the bot token from https://discord.com/developers/applications > Your App > Bot".to_string(),
        ));
    }
    if token.starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.token must be the raw token without the `Bot ` prefix".to_string(),
        ));
    }

    let prefix = discord.text_command_prefix.trim();
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "discord.text_command_prefix must be a non-empty token without whitespace"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig, environment: Environment) -> Result<(), ConfigError> {
    let (credentials, suffix) = match environment {
        Environment::Development => (&database.development, "DEV"),
        Environment::Production => (&database.production, "PROD"),
    };
    let section = format!("database.{environment}");

    let url = credentials.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{section}.url is required (set DATABASE_URL_{suffix})"
        )));
    }
    if !url.starts_with("mysql://") {
        return Err(ConfigError::Validation(format!(
            "{section}.url must be a MySQL URL (`mysql://host:port/database`)"
        )));
    }
    if credentials.user.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{section}.user is required (set DATABASE_USER_{suffix})"
        )));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("cache.path must not be empty".to_string()));
    }
    if cache.max_connections == 0 {
        return Err(ConfigError::Validation(
            "cache.max_connections must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    environment: Option<Environment>,
    discord: Option<DiscordPatch>,
    database: Option<DatabasePatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    text_command_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    development: Option<CredentialsPatch>,
    production: Option<CredentialsPatch>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsPatch {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl CredentialsPatch {
    fn apply_to(self, credentials: &mut DatabaseCredentials) {
        if let Some(url) = self.url {
            credentials.url = url;
        }
        if let Some(user) = self.user {
            credentials.user = user;
        }
        if let Some(password) = self.password {
            credentials.password = secret_value(password);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    path: Option<PathBuf>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, Environment, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: &[&str] = &[
        "ENVIRONMENT",
        "DISCORD_TOKEN",
        "DATABASE_URL_DEV",
        "DATABASE_USER_DEV",
        "DATABASE_PW_DEV",
        "DATABASE_URL_PROD",
        "DATABASE_USER_PROD",
        "DATABASE_PW_PROD",
        "HELPERBOT_LOG_LEVEL",
        "HELPERBOT_LOG_FORMAT",
        "TEST_DISCORD_TOKEN",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
    }

    fn set_both_credential_sets() {
        env::set_var("DISCORD_TOKEN", "discord-token-value");
        env::set_var("DATABASE_URL_DEV", "mysql://localhost:3306/helpers_dev");
        env::set_var("DATABASE_USER_DEV", "dev_user");
        env::set_var("DATABASE_PW_DEV", "dev-password");
        env::set_var("DATABASE_URL_PROD", "mysql://db.internal:3306/helpers");
        env::set_var("DATABASE_USER_PROD", "prod_user");
        env::set_var("DATABASE_PW_PROD", "prod-password");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn environment_flag_selects_matching_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_both_credential_sets();

        let result = (|| -> Result<(), String> {
            for (flag, expected, user) in [
                ("development", Environment::Development, "dev_user"),
                ("dev", Environment::Development, "dev_user"),
                ("production", Environment::Production, "prod_user"),
                ("PROD", Environment::Production, "prod_user"),
            ] {
                env::set_var("ENVIRONMENT", flag);
                let config = AppConfig::load(LoadOptions::default())
                    .map_err(|err| format!("config load failed for `{flag}`: {err}"))?;
                if config.environment() != expected {
                    return Err(format!("`{flag}` resolved to {}", config.environment()));
                }
                if config.credentials().user != user {
                    return Err(format!("`{flag}` selected user {}", config.credentials().user));
                }
            }
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn unset_environment_defaults_to_production() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_both_credential_sets();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.environment() == Environment::Production, "default should be production")?;
            ensure(
                config.credentials().password.expose_secret() == "prod-password",
                "production password should be selected",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn unknown_environment_flag_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_both_credential_sets();
        env::set_var("ENVIRONMENT", "staging");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("staging should not be accepted".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, value }) => {
                ensure(key == "ENVIRONMENT" && value == "staging", "error should name the flag")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars();
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_DISCORD_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("helperbot.toml");
            fs::write(
                &path,
                r#"
environment = "development"

[discord]
token = "${TEST_DISCORD_TOKEN}"

[database.development]
url = "mysql://localhost:3306/helpers_dev"
user = "dev_user"

[cache]
path = "var/cache.sqlite"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "token-from-env",
                "token should be interpolated from environment",
            )?;
            ensure(config.environment() == Environment::Development, "file environment applies")?;
            ensure(
                config.cache.resolve_path(Path::new("/opt/helperbot"))
                    == PathBuf::from("/opt/helperbot/var/cache.sqlite"),
                "relative cache path should resolve against the install directory",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DISCORD_TOKEN", "token-from-env");
        env::set_var("DATABASE_USER_PROD", "user_from_env");
        env::set_var("HELPERBOT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("helperbot.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "token-from-file"

[database.production]
url = "mysql://from-file:3306/helpers"
user = "user_from_file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("mysql://from-override:3306/helpers".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.credentials().url == "mysql://from-override:3306/helpers",
                "override database url should win",
            )?;
            ensure(config.credentials().user == "user_from_env", "env user should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "env log format applies")?;
            ensure(
                config.discord.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_both_credential_sets();
        env::remove_var("DISCORD_TOKEN");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("DISCORD_TOKEN")
                ),
                "validation failure should mention DISCORD_TOKEN",
            ),
        };

        clear_vars();
        result
    }

    #[test]
    fn only_the_selected_environment_needs_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DISCORD_TOKEN", "discord-token-value");
        env::set_var("ENVIRONMENT", "development");
        env::set_var("DATABASE_URL_DEV", "mysql://localhost:3306/helpers_dev");
        env::set_var("DATABASE_USER_DEV", "dev_user");

        let result = (|| -> Result<(), String> {
            AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("development config should load: {err}"))?;

            env::set_var("ENVIRONMENT", "production");
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::Validation(message)) => ensure(
                    message.contains("DATABASE_URL_PROD"),
                    "missing production url should be reported",
                ),
                _ => Err("production config without credentials should fail".to_string()),
            }
        })();

        clear_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_both_credential_sets();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("discord-token-value"), "debug output leaks the token")?;
            ensure(!debug.contains("prod-password"), "debug output leaks the db password")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars();
        result
    }
}
