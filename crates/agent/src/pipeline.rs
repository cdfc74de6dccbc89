//! The pipeline orchestrator: a linear state machine sequencing planning,
//! filter synthesis, criteria compilation, record fetch, and answer
//! synthesis over one mutable run state.
//!
//! Transitions are strictly forward. Planning never fails (it degrades);
//! every later stage short-circuits the run into `Failed` on its first
//! terminal error. The caller always receives a well-formed outcome: either
//! a response plus tool output, or an error payload - never both, never a
//! half-populated success.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use askcrm_core::criteria;
use askcrm_core::errors::PipelineError;
use askcrm_core::filter::Filter;
use askcrm_core::literature::{Category, Complexity};

use crate::fetch::RecordFetcher;
use crate::gateway::{DescriptorBundle, FieldDescriptorGateway, RecordStoreGateway};
use crate::llm::LlmClient;
use crate::planner::{Plan, Planner};
use crate::summarizer::AnswerSynthesizer;
use crate::synthesizer::FilterSynthesizer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Synthesizing,
    Compiling,
    Fetching,
    Summarizing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Synthesizing => "synthesizing",
            Self::Compiling => "compiling",
            Self::Fetching => "fetching",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single mutable record threaded through one run. Created per incoming
/// query, owned exclusively by the orchestrator, discarded afterwards.
#[derive(Clone, Debug, Default)]
pub struct PipelineState {
    pub query: String,
    pub category: Category,
    pub complexity: Complexity,
    pub semantic_query: String,
    pub hints: Vec<String>,
    pub filters: Vec<Filter>,
    pub criteria: String,
    pub records: Vec<Value>,
    pub response: Option<String>,
    pub error: Option<PipelineError>,
}

impl PipelineState {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            semantic_query: query.to_string(),
            ..Self::default()
        }
    }
}

/// The exposed run result. Exactly one of `response` (with structured tool
/// output) or an error-shaped `tool_output` is populated.
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub response: Option<String>,
    pub tool_output: Value,
}

impl RunOutcome {
    fn success(state: &PipelineState) -> Self {
        Self {
            response: state.response.clone(),
            tool_output: json!({
                "category": state.category.as_str(),
                "complexity": state.complexity.as_str(),
                "semantic_query": state.semantic_query,
                "criteria": state.criteria,
                "records": state.records,
            }),
        }
    }

    fn failure(error: &PipelineError) -> Self {
        Self {
            response: None,
            tool_output: json!({
                "error": error.to_string(),
                "kind": error.kind(),
            }),
        }
    }
}

pub struct Pipeline {
    planner: Planner,
    synthesizer: FilterSynthesizer,
    summarizer: AnswerSynthesizer,
    descriptors: Arc<dyn FieldDescriptorGateway>,
    fetcher: RecordFetcher,
    stage_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        descriptors: Arc<dyn FieldDescriptorGateway>,
        store: Arc<dyn RecordStoreGateway>,
        page_size: u32,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            planner: Planner::new(llm.clone()),
            synthesizer: FilterSynthesizer::new(llm.clone()),
            summarizer: AnswerSynthesizer::new(llm),
            descriptors,
            fetcher: RecordFetcher::new(store, page_size),
            stage_timeout,
        }
    }

    pub async fn run(&self, query: &str) -> RunOutcome {
        let mut state = PipelineState::new(query);

        // Planning absorbs every failure, its own timeout included.
        let plan = match self.bounded(Stage::Planning, self.planner.plan(query)).await {
            Ok(plan) => plan,
            Err(_) => Plan::fallback(query),
        };
        state.category = plan.category;
        state.complexity = plan.complexity;
        state.semantic_query = plan.semantic_query;
        info!(
            event_name = "pipeline.planning.completed",
            category = %state.category,
            complexity = %state.complexity,
            "query planned"
        );

        let semantic_query = state.semantic_query.clone();
        let category = state.category;
        let complexity = state.complexity;

        let synthesis = self
            .bounded(Stage::Synthesizing, async {
                let bundle = self
                    .descriptors
                    .describe(&semantic_query, category, complexity)
                    .await
                    .map_err(|error| PipelineError::UpstreamUnparseable {
                        raw: error.to_string(),
                    })?;
                let filters =
                    self.synthesizer.synthesize(&semantic_query, category, &bundle).await?;
                Ok::<(DescriptorBundle, Vec<Filter>), PipelineError>((bundle, filters))
            })
            .await;

        let (bundle, filters) = match synthesis.and_then(|inner| inner) {
            Ok(pair) => pair,
            Err(error) => return self.fail(state, Stage::Synthesizing, error),
        };
        state.hints = bundle.hints;
        state.filters = filters;
        info!(
            event_name = "pipeline.synthesizing.completed",
            filter_count = state.filters.len(),
            "filter set synthesized"
        );

        // Compiling is pure and cannot fail.
        state.criteria = criteria::compile(&state.filters);
        info!(
            event_name = "pipeline.compiling.completed",
            criteria = %state.criteria,
            "criteria expression compiled"
        );

        let fetched = self
            .bounded(Stage::Fetching, self.fetcher.fetch(state.category, &state.criteria))
            .await;
        state.records = match fetched.and_then(|inner| inner) {
            Ok(records) => records,
            Err(error) => return self.fail(state, Stage::Fetching, error),
        };
        info!(
            event_name = "pipeline.fetching.completed",
            record_count = state.records.len(),
            "records fetched"
        );

        let summarized = self
            .bounded(
                Stage::Summarizing,
                self.summarizer.summarize(&state.semantic_query, &state.records),
            )
            .await;
        state.response = match summarized.and_then(|inner| inner) {
            Ok(answer) => Some(answer),
            Err(error) => return self.fail(state, Stage::Summarizing, error),
        };

        info!(
            event_name = "pipeline.run.completed",
            stage = %Stage::Done,
            category = %state.category,
            "pipeline run completed"
        );
        RunOutcome::success(&state)
    }

    async fn bounded<T>(
        &self,
        stage: Stage,
        operation: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::time::timeout(self.stage_timeout, operation).await.map_err(|_| {
            PipelineError::StageTimeout {
                stage: stage.as_str(),
                timeout_secs: self.stage_timeout.as_secs(),
            }
        })
    }

    fn fail(&self, mut state: PipelineState, stage: Stage, error: PipelineError) -> RunOutcome {
        warn!(
            event_name = "pipeline.run.failed",
            stage = %stage,
            kind = error.kind(),
            error = %error,
            "pipeline run terminated"
        );
        let outcome = RunOutcome::failure(&error);
        state.error = Some(error);
        outcome
    }
}
