use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use askcrm_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key_path: &str, value: &str, env_key: &str| {
        lines.push(render_line(
            key_path,
            value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    push("llm.base_url", &config.llm.base_url, "ASKCRM_LLM_BASE_URL");
    push(
        "llm.api_key",
        &redact_secret(config.llm.api_key.expose_secret()),
        "ASKCRM_LLM_API_KEY",
    );
    push("llm.model", &config.llm.model, "ASKCRM_LLM_MODEL");
    push("llm.timeout_secs", &config.llm.timeout_secs.to_string(), "ASKCRM_LLM_TIMEOUT_SECS");
    push("llm.max_retries", &config.llm.max_retries.to_string(), "ASKCRM_LLM_MAX_RETRIES");

    push("descriptors.base_url", &config.descriptors.base_url, "ASKCRM_DESCRIPTORS_BASE_URL");
    push(
        "descriptors.timeout_secs",
        &config.descriptors.timeout_secs.to_string(),
        "ASKCRM_DESCRIPTORS_TIMEOUT_SECS",
    );

    push("records.base_url", &config.records.base_url, "ASKCRM_RECORDS_BASE_URL");
    push("records.page_size", &config.records.page_size.to_string(), "ASKCRM_RECORDS_PAGE_SIZE");
    push(
        "records.timeout_secs",
        &config.records.timeout_secs.to_string(),
        "ASKCRM_RECORDS_TIMEOUT_SECS",
    );

    push(
        "pipeline.stage_timeout_secs",
        &config.pipeline.stage_timeout_secs.to_string(),
        "ASKCRM_PIPELINE_STAGE_TIMEOUT_SECS",
    );

    push("server.bind_address", &config.server.bind_address, "ASKCRM_SERVER_BIND_ADDRESS");
    push("server.port", &config.server.port.to_string(), "ASKCRM_SERVER_PORT");

    push("logging.level", &config.logging.level, "ASKCRM_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "ASKCRM_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("askcrm.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/askcrm.toml");
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

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<unset>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
