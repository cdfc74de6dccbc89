//! Field descriptor lookup through a remote tool-invocation session.
//!
//! The gateway protocol requires a session per call: open, initialize,
//! invoke `get_filter_descriptors`, close. Close is best-effort; a failure
//! to close never fails the lookup that already succeeded.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use askcrm_agent::gateway::{DescriptorBundle, FieldDescriptorGateway};
use askcrm_core::config::DescriptorConfig;
use askcrm_core::literature::{Category, Complexity};

const DESCRIPTOR_TOOL: &str = "get_filter_descriptors";

#[derive(Clone, Debug)]
pub struct DescriptorClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl From<&DescriptorConfig> for DescriptorClientConfig {
    fn from(config: &DescriptorConfig) -> Self {
        Self { base_url: config.base_url.clone(), timeout_secs: config.timeout_secs }
    }
}

#[derive(Debug, Deserialize)]
struct SessionHandle {
    session_id: String,
}

pub struct ToolSessionDescriptorClient {
    client: reqwest::Client,
    config: DescriptorClientConfig,
}

impl ToolSessionDescriptorClient {
    pub fn new(config: DescriptorClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building descriptor gateway client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn open_session(&self) -> Result<SessionHandle> {
        let handle = self
            .client
            .post(self.url("sessions"))
            .json(&json!({}))
            .send()
            .await
            .context("opening descriptor session")?
            .error_for_status()
            .context("descriptor session open rejected")?
            .json::<SessionHandle>()
            .await
            .context("decoding descriptor session handle")?;
        Ok(handle)
    }

    async fn initialize(&self, session: &SessionHandle) -> Result<()> {
        self.client
            .post(self.url(&format!("sessions/{}/initialize", session.session_id)))
            .json(&json!({}))
            .send()
            .await
            .context("initializing descriptor session")?
            .error_for_status()
            .context("descriptor session initialize rejected")?;
        Ok(())
    }

    async fn invoke_tool(&self, session: &SessionHandle, arguments: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(&format!("sessions/{}/tools/{DESCRIPTOR_TOOL}", session.session_id)))
            .json(&arguments)
            .send()
            .await
            .context("invoking descriptor tool")?
            .error_for_status()
            .context("descriptor tool invocation rejected")?;

        response.json::<Value>().await.context("decoding descriptor tool response")
    }

    async fn close(&self, session: &SessionHandle) {
        let result = self
            .client
            .post(self.url(&format!("sessions/{}/close", session.session_id)))
            .json(&json!({}))
            .send()
            .await;
        if let Err(error) = result {
            warn!(
                event_name = "gateway.descriptor.close_failed",
                error = %error,
                "descriptor session close failed"
            );
        }
    }
}

/// Decode the tool payload, tolerating a doubly-encoded JSON string body.
fn decode_bundle(payload: Value) -> Result<DescriptorBundle> {
    let payload = match payload {
        Value::String(body) => serde_json::from_str::<Value>(&body)
            .map_err(|error| anyhow!("descriptor payload was not decodable: {error}"))?,
        other => other,
    };

    serde_json::from_value::<DescriptorBundle>(payload)
        .map_err(|error| anyhow!("descriptor payload had unexpected shape: {error}"))
}

#[async_trait]
impl FieldDescriptorGateway for ToolSessionDescriptorClient {
    async fn describe(
        &self,
        query: &str,
        category: Category,
        complexity: Complexity,
    ) -> Result<DescriptorBundle> {
        let session = self.open_session().await?;
        self.initialize(&session).await?;

        let arguments = json!({
            "question": query,
            "module": category.as_str(),
            "complexity": complexity.as_str(),
        });
        let invocation = self.invoke_tool(&session, arguments).await;
        self.close(&session).await;

        let bundle = decode_bundle(invocation?)?;
        debug!(
            event_name = "gateway.descriptor.described",
            category = %category,
            hint_count = bundle.hints.len(),
            "descriptor hints retrieved"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::decode_bundle;

    #[test]
    fn decodes_structured_bundle_payload() {
        let payload = json!({
            "hints": ["Amount: total value", "Stage: pipeline stage"],
            "descriptors": "Amount is numeric.",
            "format_instructions": "Return JSON."
        });
        let bundle = decode_bundle(payload).expect("bundle");
        assert_eq!(bundle.hints.len(), 2);
        assert_eq!(bundle.descriptors, "Amount is numeric.");
    }

    #[test]
    fn decodes_doubly_encoded_string_payload() {
        let inner = r#"{"hints": ["Email: contact email"], "descriptors": "", "format_instructions": ""}"#;
        let bundle = decode_bundle(json!(inner)).expect("bundle");
        assert_eq!(bundle.hints, vec!["Email: contact email".to_string()]);
    }

    #[test]
    fn missing_fields_default_rather_than_fail() {
        let bundle = decode_bundle(json!({"hints": []})).expect("bundle");
        assert!(bundle.hints.is_empty());
        assert!(bundle.descriptors.is_empty());
    }

    #[test]
    fn undecodable_string_payload_is_an_error() {
        assert!(decode_bundle(json!("<html>busy</html>")).is_err());
    }
}
