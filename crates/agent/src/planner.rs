//! Stage 1: intent planning.
//!
//! One completion call classifies the target category, tags complexity, and
//! rewrites the question into a canonical paragraph. This is the only stage
//! allowed to degrade silently: any transport, extraction, or decoding
//! failure falls back to `{Deals, simple, original query}`. A wrong guess
//! here surfaces later as a clean vocabulary error, never a crash.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use askcrm_core::literature::{corpus, Category, Complexity};

use crate::extract::first_json_object;
use crate::llm::LlmClient;

const PLANNING_TEMPERATURE: f32 = 0.3;

const PLANNER_SYSTEM_PROMPT: &str = "You are a CRM expert that understands natural language \
    queries, rewrites them into paragraph form, and maps them to the appropriate record category.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub category: Category,
    pub complexity: Complexity,
    pub semantic_query: String,
}

impl Plan {
    /// The fixed degraded plan: default category, simple complexity, and the
    /// user's query passed through untouched.
    pub fn fallback(query: &str) -> Self {
        Self {
            category: Category::default(),
            complexity: Complexity::default(),
            semantic_query: query.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default)]
    semantic_query: Option<String>,
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn plan(&self, query: &str) -> Plan {
        let prompt = build_prompt(query);

        let completion =
            match self.llm.complete(PLANNER_SYSTEM_PROMPT, &prompt, PLANNING_TEMPERATURE).await {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        event_name = "pipeline.planning.degraded",
                        reason = "completion_failed",
                        error = %error,
                        "planner completion failed, using fallback plan"
                    );
                    return Plan::fallback(query);
                }
            };

        match parse_plan(&completion, query) {
            Some(plan) => {
                debug!(
                    event_name = "pipeline.planning.parsed",
                    category = %plan.category,
                    complexity = %plan.complexity,
                    "planner output accepted"
                );
                plan
            }
            None => {
                warn!(
                    event_name = "pipeline.planning.degraded",
                    reason = "unparseable_completion",
                    "planner returned no usable JSON object, using fallback plan"
                );
                Plan::fallback(query)
            }
        }
    }
}

fn parse_plan(completion: &str, query: &str) -> Option<Plan> {
    let raw = first_json_object(completion)?;
    let parsed = serde_json::from_str::<RawPlan>(raw).ok()?;

    let category = parsed.module.as_deref().and_then(Category::parse).unwrap_or_default();
    let complexity = parsed.complexity.as_deref().and_then(Complexity::parse).unwrap_or_default();
    let semantic_query = parsed
        .semantic_query
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| query.to_string());

    Some(Plan { category, complexity, semantic_query })
}

fn build_prompt(query: &str) -> String {
    format!(
        "You interpret user questions about CRM records and identify the relevant record \
         category and query type.\n\n\
         Your responsibilities:\n\
         1. Analyze the user's query using the category documentation below.\n\
         2. Identify the most appropriate category: Deals, Contacts, or Leads.\n\
         3. Classify the query as either 'simple' or 'complex'.\n\
         4. Rewrite the query into a clear, well-structured paragraph of at least two full \
         sentences that communicates the original intent accurately.\n\n\
         Mandatory guidelines for the rewrite:\n\
         - Do not add any information that is not explicitly or implicitly present in the \
         original query.\n\
         - Use CRM terminology and field names only when clearly mentioned or strongly \
         implied.\n\
         - Do not invent filters, stages, fields, or conditions that were not mentioned.\n\
         - If the query is vague, keep that vagueness in the rewritten form.\n\n\
         Respond ONLY with valid JSON in this format:\n\
         {{\n  \"module\": \"<CategoryName>\",\n  \"complexity\": \"<simple|complex>\",\n  \
         \"semantic_query\": \"<a paragraph of at least two sentences>\"\n}}\n\n\
         Category documentation:\n\n{corpus}\n\
         User query:\n{query}",
        corpus = corpus(),
        query = query,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use askcrm_core::literature::{Category, Complexity};

    use super::{Plan, Planner};
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()), calls: AtomicUsize::new(0) })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self { reply: Err(message.to_string()), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    fn planner(llm: Arc<ScriptedLlm>) -> Planner {
        Planner::new(llm)
    }

    #[tokio::test]
    async fn accepts_plan_wrapped_in_prose() {
        let llm = ScriptedLlm::replying(
            "Here you go:\n{\"module\": \" leads \", \"complexity\": \"Complex\", \
             \"semantic_query\": \"The user wants new leads. They care about recent ones.\"}\n\
             Hope this helps!",
        );
        let plan = planner(llm).plan("any new leads?").await;

        assert_eq!(plan.category, Category::Leads);
        assert_eq!(plan.complexity, Complexity::Complex);
        assert!(plan.semantic_query.starts_with("The user wants"));
    }

    #[tokio::test]
    async fn falls_back_when_no_balanced_object_exists() {
        let llm = ScriptedLlm::replying("I am not able to answer in JSON today.");
        let query = "show me deals above 50k";
        let plan = planner(llm).plan(query).await;

        assert_eq!(plan, Plan::fallback(query));
        assert_eq!(plan.category, Category::Deals);
        assert_eq!(plan.semantic_query, query);
    }

    #[tokio::test]
    async fn falls_back_when_completion_call_fails() {
        let llm = ScriptedLlm::failing("connection refused");
        let plan = planner(llm).plan("who owns the Acme deal?").await;

        assert_eq!(plan, Plan::fallback("who owns the Acme deal?"));
    }

    #[tokio::test]
    async fn unknown_category_and_missing_fields_degrade_per_field() {
        let llm = ScriptedLlm::replying("{\"module\": \"Invoices\"}");
        let query = "list unpaid invoices";
        let plan = planner(llm).plan(query).await;

        // Unknown category falls back to the default, the missing rewrite
        // falls back to the original query, but the object still parses.
        assert_eq!(plan.category, Category::Deals);
        assert_eq!(plan.complexity, Complexity::Simple);
        assert_eq!(plan.semantic_query, query);
    }
}
