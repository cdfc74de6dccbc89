//! Record store search client.
//!
//! The client deliberately does not interpret the response body. Whatever
//! comes back is handed to the fetch stage, which owns classification; a
//! body that is not JSON is wrapped as a string value so that stage can
//! report it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use askcrm_agent::gateway::RecordStoreGateway;
use askcrm_core::config::RecordsConfig;
use askcrm_core::literature::Category;

use crate::token::TokenStore;

#[derive(Clone, Debug)]
pub struct RecordSearchConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl From<&RecordsConfig> for RecordSearchConfig {
    fn from(config: &RecordsConfig) -> Self {
        Self { base_url: config.base_url.clone(), timeout_secs: config.timeout_secs }
    }
}

pub struct RecordSearchClient {
    client: reqwest::Client,
    config: RecordSearchConfig,
    tokens: Arc<dyn TokenStore>,
}

impl RecordSearchClient {
    pub fn new(config: RecordSearchConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building record search client")?;
        Ok(Self { client, config, tokens })
    }

    fn search_url(&self, category: Category) -> String {
        format!("{}/{}/search", self.config.base_url.trim_end_matches('/'), category.as_str())
    }
}

#[async_trait]
impl RecordStoreGateway for RecordSearchClient {
    async fn search(&self, category: Category, criteria: &str, page_size: u32) -> Result<Value> {
        let token = self
            .tokens
            .get()
            .ok_or_else(|| anyhow!("no record store access token has been provided"))?;

        let response = self
            .client
            .get(self.search_url(category))
            .bearer_auth(token)
            .query(&[("criteria", criteria), ("per_page", &page_size.to_string())])
            .send()
            .await
            .context("record search request failed")?;

        let status = response.status();
        let body = response.text().await.context("reading record search body")?;
        debug!(
            event_name = "gateway.records.searched",
            category = %category,
            status = status.as_u16(),
            body_bytes = body.len(),
            "record search completed"
        );

        // A non-JSON body still flows downstream as a string value.
        Ok(serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body)))
    }
}
