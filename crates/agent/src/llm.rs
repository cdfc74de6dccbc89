use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Pluggable completion seam for the three model-backed stages.
///
/// Implementations must tolerate concurrent use by independent in-flight
/// pipeline runs.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        (**self).complete(system, user, temperature).await
    }
}
