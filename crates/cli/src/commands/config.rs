use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shelfdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in effective_values(&config) {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

/// Reported key, display value and the env vars that can set it.
type ConfigEntry = (&'static str, String, &'static [&'static str]);

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigEntry {
    (key, value, env_keys)
}

fn effective_values(config: &AppConfig) -> Vec<ConfigEntry> {
    let api_key = match &config.llm.api_key {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    let faq_path = config
        .agent
        .faq_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());

    vec![
        entry("database.url", config.database.url.clone(), &["SHELFDESK_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["SHELFDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["SHELFDESK_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "database.lookup_timeout_secs",
            config.database.lookup_timeout_secs.to_string(),
            &["SHELFDESK_DATABASE_LOOKUP_TIMEOUT_SECS"],
        ),
        entry("llm.provider", format!("{:?}", config.llm.provider), &["SHELFDESK_LLM_PROVIDER"]),
        entry("llm.model", config.llm.model.clone(), &["SHELFDESK_LLM_MODEL"]),
        entry("llm.base_url", config.llm.effective_base_url(), &["SHELFDESK_LLM_BASE_URL"]),
        entry("llm.api_key", api_key, &["SHELFDESK_LLM_API_KEY"]),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["SHELFDESK_LLM_TIMEOUT_SECS"],
        ),
        entry(
            "llm.max_attempts",
            config.llm.max_attempts.to_string(),
            &["SHELFDESK_LLM_MAX_ATTEMPTS"],
        ),
        entry(
            "llm.retry_backoff_ms",
            config.llm.retry_backoff_ms.to_string(),
            &["SHELFDESK_LLM_RETRY_BACKOFF_MS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["SHELFDESK_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["SHELFDESK_SERVER_PORT"]),
        entry(
            "session.history_limit",
            config.session.history_limit.to_string(),
            &["SHELFDESK_SESSION_HISTORY_LIMIT"],
        ),
        entry(
            "session.idle_timeout_secs",
            config.session.idle_timeout_secs.to_string(),
            &["SHELFDESK_SESSION_IDLE_TIMEOUT_SECS"],
        ),
        entry("agent.store_name", config.agent.store_name.clone(), &["SHELFDESK_AGENT_STORE_NAME"]),
        entry(
            "agent.assistant_name",
            config.agent.assistant_name.clone(),
            &["SHELFDESK_AGENT_ASSISTANT_NAME"],
        ),
        entry(
            "agent.generative_extraction",
            config.agent.generative_extraction.to_string(),
            &["SHELFDESK_AGENT_GENERATIVE_EXTRACTION"],
        ),
        entry("agent.faq_path", faq_path, &["SHELFDESK_AGENT_FAQ_PATH"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["SHELFDESK_LOGGING_LEVEL", "SHELFDESK_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SHELFDESK_LOGGING_FORMAT", "SHELFDESK_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("shelfdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/shelfdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
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

/// Keeps a short recognisable prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
