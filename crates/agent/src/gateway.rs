use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use askcrm_core::literature::{Category, Complexity};

/// Candidate field material for one (query, category, complexity) triple.
///
/// `hints` is the allowed field vocabulary source: each entry names a field
/// in its leading token followed by a description snippet.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DescriptorBundle {
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub descriptors: String,
    #[serde(default)]
    pub format_instructions: String,
}

#[async_trait]
pub trait FieldDescriptorGateway: Send + Sync {
    async fn describe(
        &self,
        query: &str,
        category: Category,
        complexity: Complexity,
    ) -> Result<DescriptorBundle>;
}

/// Executes a compiled criteria expression against the remote record store.
///
/// The returned value is deliberately raw: it may be a structured object, a
/// string that still needs decoding, `null`, or an empty object. The fetch
/// stage owns classification of all of these.
#[async_trait]
pub trait RecordStoreGateway: Send + Sync {
    async fn search(&self, category: Category, criteria: &str, page_size: u32) -> Result<Value>;
}
