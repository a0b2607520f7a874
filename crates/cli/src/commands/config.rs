use std::env;
use std::fs;
use std::path::Path;

use musicshare_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in effective_values(&config) {
        let source = field_source(
            entry.key_path,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key_path, &entry.value, source));
    }

    lines.join("\n")
}

struct EffectiveValue {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn field(
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
) -> EffectiveValue {
    EffectiveValue { key_path, env_keys, value }
}

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    vec![
        field(
            "slack.bot_token",
            &["MUSICSHARE_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        field(
            "slack.bot_user_id",
            &["MUSICSHARE_SLACK_BOT_USER_ID", "BOT_ID"],
            config.slack.bot_user_id.clone(),
        ),
        field(
            "slack.channels",
            &["MUSICSHARE_SLACK_CHANNELS"],
            render_list(&config.slack.channels),
        ),
        field(
            "slack.api_base_url",
            &["MUSICSHARE_SLACK_API_BASE_URL"],
            config.slack.api_base_url.clone(),
        ),
        field(
            "catalog.client_id",
            &["MUSICSHARE_CATALOG_CLIENT_ID"],
            config.catalog.client_id.clone(),
        ),
        field(
            "catalog.client_secret",
            &["MUSICSHARE_CATALOG_CLIENT_SECRET"],
            redact_secret(config.catalog.client_secret.expose_secret()),
        ),
        field(
            "catalog.token_url",
            &["MUSICSHARE_CATALOG_TOKEN_URL"],
            config.catalog.token_url.clone(),
        ),
        field(
            "catalog.api_base_url",
            &["MUSICSHARE_CATALOG_API_BASE_URL"],
            config.catalog.api_base_url.clone(),
        ),
        field(
            "ledger.spreadsheet_id",
            &["MUSICSHARE_LEDGER_SPREADSHEET_ID"],
            config.ledger.spreadsheet_id.clone(),
        ),
        field(
            "ledger.worksheet",
            &["MUSICSHARE_LEDGER_WORKSHEET"],
            config.ledger.worksheet.clone(),
        ),
        field(
            "ledger.credentials_path",
            &["MUSICSHARE_LEDGER_CREDENTIALS_PATH"],
            config.ledger.credentials_path.display().to_string(),
        ),
        field(
            "ledger.unmatched_rating",
            &["MUSICSHARE_LEDGER_UNMATCHED_RATING"],
            format!("{:?}", config.ledger.unmatched_rating),
        ),
        field(
            "access.allowed_users",
            &["MUSICSHARE_ACCESS_ALLOWED_USERS"],
            render_list(&config.access.allowed_users),
        ),
        field(
            "access.privileged_users",
            &["MUSICSHARE_ACCESS_PRIVILEGED_USERS"],
            render_list(&config.access.privileged_users),
        ),
        field(
            "poll.interval_ms",
            &["MUSICSHARE_POLL_INTERVAL_MS"],
            config.poll.interval_ms.to_string(),
        ),
        field(
            "http.timeout_secs",
            &["MUSICSHARE_HTTP_TIMEOUT_SECS"],
            config.http.timeout_secs.to_string(),
        ),
        field(
            "logging.level",
            &["MUSICSHARE_LOGGING_LEVEL", "MUSICSHARE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["MUSICSHARE_LOGGING_FORMAT", "MUSICSHARE_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
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

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        return "<empty>".to_string();
    }
    values.join(", ")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
