//! Stage 5: answer synthesis.
//!
//! Empty record sets short-circuit to a fixed sentence without spending a
//! model call. Otherwise a lightweight keyword scan produces intent hints
//! (not a hard classifier) that steer the prompt, and the completion text is
//! returned verbatim as the final answer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use askcrm_core::errors::PipelineError;

use crate::llm::LlmClient;

pub const NO_MATCH_RESPONSE: &str = "I couldn't find any matching records for your query.";

const SUMMARY_TEMPERATURE: f32 = 0.7;

const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a helpful CRM assistant that provides natural, \
    conversational responses about CRM data.";

const SEARCH_TERMS: [&str; 6] = ["show", "find", "list", "get", "search", "display"];
const COUNT_TERMS: [&str; 3] = ["how many", "count", "number of"];
const SPECIFIC_TERMS: [&str; 7] = ["who", "what", "which", "when", "where", "highest", "lowest"];
const SUMMARY_TERMS: [&str; 4] = ["summary", "overview", "insight", "analyze"];

/// Intent hints from four independent keyword sets. A query may set zero,
/// one, or several flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntentFlags {
    pub search: bool,
    pub count: bool,
    pub specific: bool,
    pub summary: bool,
}

impl IntentFlags {
    pub fn from_query(query: &str) -> Self {
        let lowered = query.to_lowercase();
        let matches_any = |terms: &[&str]| terms.iter().any(|term| lowered.contains(term));

        Self {
            search: matches_any(&SEARCH_TERMS),
            count: matches_any(&COUNT_TERMS),
            specific: matches_any(&SPECIFIC_TERMS) || lowered.contains("top"),
            summary: matches_any(&SUMMARY_TERMS),
        }
    }
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn summarize(
        &self,
        semantic_query: &str,
        records: &[Value],
    ) -> Result<String, PipelineError> {
        if records.is_empty() {
            return Ok(NO_MATCH_RESPONSE.to_string());
        }

        let flags = IntentFlags::from_query(semantic_query);
        let prompt = build_prompt(semantic_query, records, flags);

        self.llm
            .complete(SUMMARIZER_SYSTEM_PROMPT, &prompt, SUMMARY_TEMPERATURE)
            .await
            .map_err(|error| PipelineError::CompletionFailed { detail: error.to_string() })
    }
}

fn build_prompt(semantic_query: &str, records: &[Value], flags: IntentFlags) -> String {
    let records_json = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    let flags_json = serde_json::to_string(&flags).unwrap_or_else(|_| "{}".to_string());

    format!(
        "The user asked: \"{query}\"\n\n\
         Here is the relevant data:\n{records}\n\n\
         Rules for your response:\n\
         1. Be conversational and natural; do not sound like a robot listing data.\n\
         2. If the user is searching for specific information, answer their question \
         directly.\n\
         3. If they want a list, organize the information in a way that fits their query.\n\
         4. If they ask about counts, give the count in a natural way.\n\
         5. Do not just enumerate the data; explain what it means for their question.\n\
         6. If there are multiple records, group or summarize them meaningfully.\n\
         7. Avoid technical jargon unless the query asks for it.\n\n\
         Intent flags: {flags}\n\n\
         Respond as if you are having a conversation with the user.",
        query = semantic_query,
        records = records_json,
        flags = flags_json,
    )
}
