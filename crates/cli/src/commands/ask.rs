use std::env;
use std::sync::Arc;
use std::time::Duration;

use askcrm_agent::pipeline::Pipeline;
use askcrm_core::config::{AppConfig, LoadOptions};
use askcrm_gateways::{
    ChatCompletionClient, ChatCompletionConfig, DescriptorClientConfig, InMemoryTokenStore,
    RecordSearchClient, RecordSearchConfig, TokenStore, ToolSessionDescriptorClient,
};

use crate::commands::CommandResult;

/// One-shot record store token for CLI runs; the server takes its token
/// over HTTP instead.
pub const RECORDS_TOKEN_ENV: &str = "ASKCRM_RECORDS_ACCESS_TOKEN";

pub fn run(query: &str) -> CommandResult {
    let query = query.trim();
    if query.is_empty() {
        return CommandResult::failure("ask", "invalid_arguments", "query must not be blank", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2);
        }
    };

    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            return CommandResult::failure("ask", "gateway_construction", error.to_string(), 3);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_initialization",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let outcome = runtime.block_on(pipeline.run(query));
    let exit_code = if outcome.response.is_some() { 0 } else { 1 };
    let output = serde_json::to_string_pretty(&outcome)
        .unwrap_or_else(|error| format!("{{\"error\": \"serialization failed: {error}\"}}"));

    CommandResult { exit_code, output }
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<Pipeline> {
    let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    if let Some(token) = env::var(RECORDS_TOKEN_ENV).ok().filter(|value| !value.trim().is_empty())
    {
        tokens.set(token);
    }

    let llm = ChatCompletionClient::new(ChatCompletionConfig::from(&config.llm))?;
    let descriptors =
        ToolSessionDescriptorClient::new(DescriptorClientConfig::from(&config.descriptors))?;
    let records = RecordSearchClient::new(RecordSearchConfig::from(&config.records), tokens)?;

    Ok(Pipeline::new(
        Arc::new(llm),
        Arc::new(descriptors),
        Arc::new(records),
        config.records.page_size,
        Duration::from_secs(config.pipeline.stage_timeout_secs),
    ))
}
