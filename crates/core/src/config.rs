use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub descriptors: DescriptorConfig,
    pub records: RecordsConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct DescriptorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecordsConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub stage_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
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
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub descriptors_base_url: Option<String>,
    pub records_base_url: Option<String>,
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
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new().into(),
                model: "gpt-4.1-mini".to_string(),
                timeout_secs: 30,
                max_retries: 0,
            },
            descriptors: DescriptorConfig {
                base_url: "http://localhost:8900".to_string(),
                timeout_secs: 30,
            },
            records: RecordsConfig {
                base_url: "https://www.zohoapis.com/crm/v7".to_string(),
                page_size: 15,
                timeout_secs: 30,
            },
            pipeline: PipelineConfig { stage_timeout_secs: 45 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    descriptors: Option<DescriptorPatch>,
    records: Option<RecordsPatch>,
    pipeline: Option<PipelinePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DescriptorPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordsPatch {
    base_url: Option<String>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    stage_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("askcrm.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(descriptors) = patch.descriptors {
            if let Some(base_url) = descriptors.base_url {
                self.descriptors.base_url = base_url;
            }
            if let Some(timeout_secs) = descriptors.timeout_secs {
                self.descriptors.timeout_secs = timeout_secs;
            }
        }

        if let Some(records) = patch.records {
            if let Some(base_url) = records.base_url {
                self.records.base_url = base_url;
            }
            if let Some(page_size) = records.page_size {
                self.records.page_size = page_size;
            }
            if let Some(timeout_secs) = records.timeout_secs {
                self.records.timeout_secs = timeout_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(stage_timeout_secs) = pipeline.stage_timeout_secs {
                self.pipeline.stage_timeout_secs = stage_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("ASKCRM_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("ASKCRM_LLM_API_KEY") {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("ASKCRM_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ASKCRM_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ASKCRM_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ASKCRM_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("ASKCRM_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("ASKCRM_DESCRIPTORS_BASE_URL") {
            self.descriptors.base_url = value;
        }
        if let Some(value) = read_env("ASKCRM_DESCRIPTORS_TIMEOUT_SECS") {
            self.descriptors.timeout_secs = parse_u64("ASKCRM_DESCRIPTORS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKCRM_RECORDS_BASE_URL") {
            self.records.base_url = value;
        }
        if let Some(value) = read_env("ASKCRM_RECORDS_PAGE_SIZE") {
            self.records.page_size = parse_u32("ASKCRM_RECORDS_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("ASKCRM_RECORDS_TIMEOUT_SECS") {
            self.records.timeout_secs = parse_u64("ASKCRM_RECORDS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKCRM_PIPELINE_STAGE_TIMEOUT_SECS") {
            self.pipeline.stage_timeout_secs =
                parse_u64("ASKCRM_PIPELINE_STAGE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKCRM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ASKCRM_SERVER_PORT") {
            self.server.port = parse_u16("ASKCRM_SERVER_PORT", &value)?;
        }

        let log_level = read_env("ASKCRM_LOGGING_LEVEL").or_else(|| read_env("ASKCRM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ASKCRM_LOGGING_FORMAT").or_else(|| read_env("ASKCRM_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(descriptors_base_url) = overrides.descriptors_base_url {
            self.descriptors.base_url = descriptors_base_url;
        }
        if let Some(records_base_url) = overrides.records_base_url {
            self.records.base_url = records_base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_base_url("descriptors.base_url", &self.descriptors.base_url)?;
        validate_base_url("records.base_url", &self.records.base_url)?;
        validate_records(&self.records)?;
        validate_pipeline(&self.pipeline)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("askcrm.toml"), PathBuf::from("config/askcrm.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_base_url("llm.base_url", &llm.base_url)?;

    if llm.api_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set ASKCRM_LLM_API_KEY or [llm] api_key)".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
    }

    Ok(())
}

fn validate_base_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "{field} must be an http(s) URL, got `{url}`"
        )));
    }
    Ok(())
}

fn validate_records(records: &RecordsConfig) -> Result<(), ConfigError> {
    if records.page_size == 0 || records.page_size > 200 {
        return Err(ConfigError::Validation(
            "records.page_size must be in range 1..=200".to_string(),
        ));
    }
    if records.timeout_secs == 0 || records.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "records.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.stage_timeout_secs == 0 || pipeline.stage_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "pipeline.stage_timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let allowed = ["trace", "debug", "info", "warn", "error"];
    if !allowed.contains(&logging.level.trim().to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn options_with_key() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                llm_api_key: Some("sk-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn defaults_validate_once_api_key_is_supplied() {
        let config = AppConfig::load(options_with_key()).expect("config should load");
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.records.page_size, 15);
        assert_eq!(config.pipeline.stage_timeout_secs, 45);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let result = AppConfig::load(LoadOptions::default());
        let message = match result {
            Err(ConfigError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert!(message.contains("llm.api_key"));
    }

    #[test]
    fn config_file_patch_applies_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[llm]
api_key = "sk-file"
model = "gpt-4o-mini"
max_retries = 2

[records]
page_size = 25

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect("config should load");

        assert_eq!(config.llm.api_key.expose_secret(), "sk-file");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.records.page_size, 25);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn require_file_reports_missing_path() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does/not/exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn out_of_range_page_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[llm]
api_key = "sk-file"

[records]
page_size = 0
"#
        )
        .expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[llm]
api_key = "sk-file"

[records]
base_url = "ftp://records.internal"
"#
        )
        .expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn unterminated_interpolation_is_an_error() {
        let result = super::interpolate_env_vars("value = \"${UNCLOSED");
        assert!(matches!(result, Err(ConfigError::UnterminatedInterpolation)));
    }
}
