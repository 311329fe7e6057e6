use std::env;
use std::fs;
use std::path::Path;

use pinbot_core::config::{
    resolve_config_path, AppConfig, LoadOptions, DISCORD_TOKEN_ENV_KEYS, LOG_FORMAT_ENV_KEYS,
    LOG_LEVEL_ENV_KEYS,
};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

pub fn render(config: &AppConfig, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, file_doc, file_path)
    };

    let rows = [
        (
            "discord.token",
            redact_token(config.discord.token.expose_secret()),
            source("discord.token", &DISCORD_TOKEN_ENV_KEYS),
        ),
        (
            "gateway.max_retries",
            config.gateway.max_retries.to_string(),
            source("gateway.max_retries", &["PINBOT_GATEWAY_MAX_RETRIES"]),
        ),
        (
            "gateway.base_delay_ms",
            config.gateway.base_delay_ms.to_string(),
            source("gateway.base_delay_ms", &["PINBOT_GATEWAY_BASE_DELAY_MS"]),
        ),
        (
            "gateway.max_delay_ms",
            config.gateway.max_delay_ms.to_string(),
            source("gateway.max_delay_ms", &["PINBOT_GATEWAY_MAX_DELAY_MS"]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["PINBOT_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            source("server.health_check_port", &["PINBOT_SERVER_HEALTH_CHECK_PORT"]),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", &["PINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        ("logging.level", config.logging.level.clone(), source("logging.level", &LOG_LEVEL_ENV_KEYS)),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &LOG_FORMAT_ENV_KEYS),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(rows.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

// Bot tokens are `<base64 user id>.<timestamp>.<hmac>`; the id part is not secret.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pinbot_core::config::AppConfig;
    use toml::Value;

    use super::{contains_path, redact_token, render};

    #[test]
    fn redacts_everything_after_the_id_segment() {
        assert_eq!(redact_token("MTIz.abc.def"), "MTIz.***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_file_document() {
        let doc: Value = "[gateway]\nmax_retries = 3\n".parse().expect("toml");
        assert!(contains_path(&doc, "gateway.max_retries"));
        assert!(!contains_path(&doc, "gateway.max_delay_ms"));
        assert!(!contains_path(&doc, "server.bind_address"));
    }

    #[test]
    fn render_attributes_file_values_and_hides_token() {
        let mut config = AppConfig::default();
        config.discord.token = "MTIz.secret.part".to_string().into();
        config.server.health_check_port = 9090;
        let doc: Value = "[server]\nhealth_check_port = 9090\n".parse().expect("toml");

        let output = render(&config, Some(&doc), Some(Path::new("pinbot.toml")));

        assert!(output.contains("- discord.token = MTIz.*** ("));
        assert!(!output.contains("secret"));
        assert!(output
            .contains("- server.health_check_port = 9090 (source: file (pinbot.toml))"));
        assert!(output.contains("- gateway.max_retries = 5 (source:"));
    }
}
