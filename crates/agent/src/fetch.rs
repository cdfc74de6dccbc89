//! Stage 4: record fetch and outcome classification.
//!
//! Every possible gateway outcome maps to exactly one taxonomy entry before
//! control returns: transport or undecodable body, empty response, embedded
//! error field, or a missing/empty records collection. Only a non-empty
//! records collection proceeds to answer synthesis.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use askcrm_core::errors::PipelineError;
use askcrm_core::literature::Category;

use crate::gateway::RecordStoreGateway;

pub struct RecordFetcher {
    store: Arc<dyn RecordStoreGateway>,
    page_size: u32,
}

impl RecordFetcher {
    pub fn new(store: Arc<dyn RecordStoreGateway>, page_size: u32) -> Self {
        Self { store, page_size }
    }

    pub async fn fetch(
        &self,
        category: Category,
        criteria: &str,
    ) -> Result<Vec<Value>, PipelineError> {
        let response = self
            .store
            .search(category, criteria, self.page_size)
            .await
            .map_err(|error| PipelineError::UpstreamUnparseable { raw: error.to_string() })?;

        let records = classify(criteria, response)?;
        debug!(
            event_name = "pipeline.fetch.records",
            category = %category,
            record_count = records.len(),
            "record store returned matching records"
        );
        Ok(records)
    }
}

/// Classify one raw gateway response into records or a disjoint error kind.
fn classify(criteria: &str, response: Value) -> Result<Vec<Value>, PipelineError> {
    // A string body is a response that still needs decoding.
    let response = match response {
        Value::String(body) => match serde_json::from_str::<Value>(&body) {
            Ok(decoded) => decoded,
            Err(_) => return Err(PipelineError::UpstreamUnparseable { raw: body }),
        },
        other => other,
    };

    let map = match &response {
        Value::Null => {
            return Err(PipelineError::UpstreamEmpty { criteria: criteria.to_string() })
        }
        Value::Object(map) => map,
        other => {
            return Err(PipelineError::UpstreamUnparseable { raw: other.to_string() });
        }
    };

    if map.is_empty() {
        return Err(PipelineError::UpstreamEmpty { criteria: criteria.to_string() });
    }

    if let Some(error_field) = map.get("error") {
        return Err(PipelineError::UpstreamErrorField {
            criteria: criteria.to_string(),
            detail: error_field.to_string(),
        });
    }

    let records = map
        .get("results")
        .and_then(|results| results.get("data"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if records.is_empty() {
        return Err(PipelineError::UpstreamNoRecords { criteria: criteria.to_string() });
    }

    Ok(records)
}
