//! Stage 2: filter synthesis.
//!
//! Builds a prompt containing only the caller-supplied descriptor hints and
//! re-validates everything the model proposes against that same vocabulary
//! and the fixed filter schema. One bad entry fails the whole request; there
//! is no partial filter set and no retry.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use askcrm_core::errors::PipelineError;
use askcrm_core::filter::{FieldVocabulary, Filter, FilterError};
use askcrm_core::literature::Category;

use crate::extract::first_json_object;
use crate::gateway::DescriptorBundle;
use crate::llm::LlmClient;

const SYNTHESIS_TEMPERATURE: f32 = 0.3;

const SYNTHESIZER_SYSTEM_PROMPT: &str =
    "You are an assistant that helps construct CRM search queries.";

#[derive(Debug, Deserialize)]
struct RawFilterResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    filters: Option<Vec<Value>>,
}

pub struct FilterSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl FilterSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn synthesize(
        &self,
        semantic_query: &str,
        category: Category,
        bundle: &DescriptorBundle,
    ) -> Result<Vec<Filter>, PipelineError> {
        let vocabulary = FieldVocabulary::from_hints(&bundle.hints);
        let prompt = build_prompt(semantic_query, category, bundle);

        let completion = self
            .llm
            .complete(SYNTHESIZER_SYSTEM_PROMPT, &prompt, SYNTHESIS_TEMPERATURE)
            .await
            .map_err(|error| PipelineError::CompletionFailed { detail: error.to_string() })?;

        let object = match first_json_object(&completion) {
            Some(raw) => raw.to_string(),
            None => return Err(PipelineError::UpstreamUnparseable { raw: completion }),
        };

        let parsed = match serde_json::from_str::<RawFilterResponse>(&object) {
            Ok(parsed) => parsed,
            Err(_) => return Err(PipelineError::UpstreamUnparseable { raw: completion }),
        };

        if let Some(detail) = parsed.error {
            return Err(PipelineError::FieldNotFound { detail });
        }

        // A missing or empty filter list is vacuously valid: the run
        // proceeds with an empty criteria expression and the record store
        // classifies the outcome.
        let entries = parsed.filters.unwrap_or_default();

        let mut filters = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let filter = serde_json::from_value::<Filter>(entry).map_err(|error| {
                PipelineError::FilterSchemaViolation(FilterError::Malformed {
                    index,
                    detail: error.to_string(),
                })
            })?;

            filter.validate(&vocabulary).map_err(|error| match error {
                FilterError::UnknownField { .. } => {
                    PipelineError::FieldNotFound { detail: error.to_string() }
                }
                other => PipelineError::FilterSchemaViolation(other),
            })?;

            filters.push(filter);
        }

        debug!(
            event_name = "pipeline.synthesis.validated",
            filter_count = filters.len(),
            vocabulary_size = vocabulary.len(),
            "filter set validated against supplied vocabulary"
        );

        Ok(filters)
    }
}

fn build_prompt(semantic_query: &str, category: Category, bundle: &DescriptorBundle) -> String {
    format!(
        "Construct search filters for a CRM query. Here is the user query:\n\n\
         {query}\n\n\
         Category: {category}\n\n\
         Rules:\n\
         1. Use only the API field names listed below. Never guess or invent an API name \
         that is not explicitly listed.\n\
         2. If the query references a field that is not in the list, return exactly:\n\
         {{ \"error\": \"Relevant field not found in context.\" }}\n\
         3. Follow the format instructions strictly.\n\
         4. Return only JSON. No notes, no explanation.\n\n\
         API field information:\n{hints}\n\n\
         {descriptors}\n\n\
         {format_instructions}",
        query = semantic_query,
        category = category,
        hints = bundle.hints.join("\n\n"),
        descriptors = bundle.descriptors,
        format_instructions = bundle.format_instructions,
    )
}
