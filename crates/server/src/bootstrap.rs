use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use askcrm_agent::pipeline::Pipeline;
use askcrm_core::config::{AppConfig, ConfigError, LoadOptions};
use askcrm_gateways::{
    ChatCompletionClient, ChatCompletionConfig, DescriptorClientConfig, InMemoryTokenStore,
    RecordSearchClient, RecordSearchConfig, TokenStore, ToolSessionDescriptorClient,
};

pub struct Application {
    pub config: AppConfig,
    pub pipeline: Arc<Pipeline>,
    pub tokens: Arc<dyn TokenStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("gateway construction failed: {0}")]
    Gateway(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let pipeline = Arc::new(build_pipeline(&config, tokens.clone())?);

    info!(
        event_name = "system.bootstrap.ready",
        model = %config.llm.model,
        records_base_url = %config.records.base_url,
        "pipeline wired to remote gateways"
    );

    Ok(Application { config, pipeline, tokens })
}

pub fn build_pipeline(
    config: &AppConfig,
    tokens: Arc<dyn TokenStore>,
) -> Result<Pipeline, BootstrapError> {
    let llm = ChatCompletionClient::new(ChatCompletionConfig::from(&config.llm))
        .map_err(|error| BootstrapError::Gateway(error.into()))?;
    let descriptors =
        ToolSessionDescriptorClient::new(DescriptorClientConfig::from(&config.descriptors))
            .map_err(BootstrapError::Gateway)?;
    let records = RecordSearchClient::new(RecordSearchConfig::from(&config.records), tokens)
        .map_err(BootstrapError::Gateway)?;

    Ok(Pipeline::new(
        Arc::new(llm),
        Arc::new(descriptors),
        Arc::new(records),
        config.records.page_size,
        std::time::Duration::from_secs(config.pipeline.stage_timeout_secs),
    ))
}
