use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricelens_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    CommandResult { exit_code: 0, output: render(&config) }
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<embedded>".to_string());
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let fields: Vec<(&str, String, Option<&str>)> = vec![
        ("catalog.path", catalog_path, Some("PRICELENS_CATALOG_PATH")),
        ("resolver.exact_score", config.resolver.exact_score.to_string(), None),
        (
            "resolver.query_contains_key_score",
            config.resolver.query_contains_key_score.to_string(),
            None,
        ),
        (
            "resolver.key_contains_query_score",
            config.resolver.key_contains_query_score.to_string(),
            None,
        ),
        ("resolver.word_overlap_score", config.resolver.word_overlap_score.to_string(), None),
        (
            "resolver.min_word_len",
            config.resolver.min_word_len.to_string(),
            Some("PRICELENS_RESOLVER_MIN_WORD_LEN"),
        ),
        (
            "resolver.confidence_floor",
            config.resolver.confidence_floor.to_string(),
            Some("PRICELENS_RESOLVER_CONFIDENCE_FLOOR"),
        ),
        ("pricing.usd_rate", config.pricing.usd_rate.to_string(), Some("PRICELENS_PRICING_USD_RATE")),
        (
            "pricing.stable_threshold_pct",
            config.pricing.stable_threshold_pct.to_string(),
            Some("PRICELENS_PRICING_STABLE_THRESHOLD_PCT"),
        ),
        ("pricing.mean_reversion", config.pricing.mean_reversion.to_string(), None),
        ("llm.enabled", config.llm.enabled.to_string(), Some("PRICELENS_LLM_ENABLED")),
        ("llm.api_key", api_key, Some("PRICELENS_LLM_API_KEY")),
        ("llm.base_url", config.llm.base_url.clone(), Some("PRICELENS_LLM_BASE_URL")),
        ("llm.model", config.llm.model.clone(), Some("PRICELENS_LLM_MODEL")),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), Some("PRICELENS_LLM_TIMEOUT_SECS")),
        ("llm.max_retries", config.llm.max_retries.to_string(), Some("PRICELENS_LLM_MAX_RETRIES")),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("PRICELENS_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("PRICELENS_SERVER_PORT")),
        (
            "server.request_timeout_secs",
            config.server.request_timeout_secs.to_string(),
            Some("PRICELENS_SERVER_REQUEST_TIMEOUT_SECS"),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("PRICELENS_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("PRICELENS_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            Some("PRICELENS_LOGGING_FORMAT"),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_key) in fields {
        let source =
            field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("pricelens.toml"), PathBuf::from("config/pricelens.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
