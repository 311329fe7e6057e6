use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub discord_token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub health_check_port: Option<u16>,
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

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["pinbot.toml", "config/pinbot.toml"];

pub const DISCORD_TOKEN_ENV_KEYS: [&str; 2] = ["PINBOT_DISCORD_TOKEN", "DISCORD_TOKEN"];
pub const LOG_LEVEL_ENV_KEYS: [&str; 3] = ["PINBOT_LOGGING_LEVEL", "PINBOT_LOG_LEVEL", "LOG_LEVEL"];
pub const LOG_FORMAT_ENV_KEYS: [&str; 3] =
    ["PINBOT_LOGGING_FORMAT", "PINBOT_LOG_FORMAT", "LOG_FORMAT"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig { token: String::new().into() },
            gateway: GatewayConfig { max_retries: 5, base_delay_ms: 500, max_delay_ms: 30_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(discord_token_value) = discord.token {
                self.discord.token = secret_value(discord_token_value);
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = gateway.base_delay_ms {
                self.gateway.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = gateway.max_delay_ms {
                self.gateway.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_first_env(&DISCORD_TOKEN_ENV_KEYS) {
            self.discord.token = secret_value(value);
        }

        if let Some(value) = read_env("PINBOT_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = parse_u32("PINBOT_GATEWAY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("PINBOT_GATEWAY_BASE_DELAY_MS") {
            self.gateway.base_delay_ms = parse_u64("PINBOT_GATEWAY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("PINBOT_GATEWAY_MAX_DELAY_MS") {
            self.gateway.max_delay_ms = parse_u64("PINBOT_GATEWAY_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("PINBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PINBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("PINBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_first_env(&LOG_LEVEL_ENV_KEYS) {
            self.logging.level = value;
        }
        if let Some(value) = read_first_env(&LOG_FORMAT_ENV_KEYS) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_gateway(&self.gateway)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
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
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }
    if token.chars().any(char::is_whitespace) {
        let hint = if token.starts_with("Bot ") {
            " (hint: drop the `Bot ` prefix, it is added automatically)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "discord.token must not contain whitespace{hint}"
        )));
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.base_delay_ms > gateway.max_delay_ms {
        return Err(ConfigError::Validation(
            "gateway.base_delay_ms must not exceed gateway.max_delay_ms".to_string(),
        ));
    }

    if gateway.max_delay_ms > 600_000 {
        return Err(ConfigError::Validation(
            "gateway.max_delay_ms must be at most 600000 (10 minutes)".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn read_first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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
    discord: Option<DiscordPatch>,
    gateway: Option<GatewayPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: [&str; 8] = [
        "PINBOT_DISCORD_TOKEN",
        "DISCORD_TOKEN",
        "PINBOT_LOGGING_LEVEL",
        "PINBOT_LOG_LEVEL",
        "LOG_LEVEL",
        "PINBOT_LOGGING_FORMAT",
        "PINBOT_LOG_FORMAT",
        "LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);
        env::set_var("TEST_PINBOT_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pinbot.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "${TEST_PINBOT_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "token-from-env",
                "discord token should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_PINBOT_TOKEN"]);
        result
    }

    #[test]
    fn plain_discord_token_and_log_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        env::set_var("DISCORD_TOKEN", "plain-token");
        env::set_var("LOG_LEVEL", "warn");
        env::set_var("PINBOT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "plain-token",
                "DISCORD_TOKEN alias should be honored",
            )?;
            ensure(config.logging.level == "warn", "LOG_LEVEL alias should be honored")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&ALL_VARS);
        result
    }

    #[test]
    fn prefixed_token_wins_over_plain_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        env::set_var("PINBOT_DISCORD_TOKEN", "prefixed-token");
        env::set_var("DISCORD_TOKEN", "plain-token");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.discord.token.expose_secret() == "prefixed-token",
                "PINBOT_DISCORD_TOKEN should take precedence",
            )
        })();

        clear_vars(&ALL_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        env::set_var("PINBOT_DISCORD_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pinbot.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "token-from-file"

[gateway]
max_retries = 9

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.gateway.max_retries == 9, "file value should replace default")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.discord.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )
        })();

        clear_vars(&ALL_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_without_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("discord.token")
        );
        ensure(has_message, "validation failure should mention discord.token")
    }

    #[test]
    fn validation_rejects_bot_prefixed_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some("Bot abc.def".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        let has_hint = matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("`Bot ` prefix")
        );
        ensure(has_hint, "bot-prefixed token should be rejected with a hint")
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);
        env::set_var("PINBOT_DISCORD_TOKEN", "token");
        env::set_var("PINBOT_GATEWAY_MAX_RETRIES", "many");

        let result = AppConfig::load(LoadOptions::default());
        let reported = matches!(
            result,
            Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "PINBOT_GATEWAY_MAX_RETRIES"
        );

        clear_vars(&ALL_VARS);
        clear_vars(&["PINBOT_GATEWAY_MAX_RETRIES"]);
        ensure(reported, "non-numeric retry count should be rejected")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ALL_VARS);

        env::set_var("PINBOT_DISCORD_TOKEN", "very-secret-token-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("very-secret-token-value"),
                "debug output should not contain the discord token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&ALL_VARS);
        result
    }
}
