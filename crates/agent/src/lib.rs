//! Query pipeline - turns a free-text CRM question into a structured search
//! and a conversational answer.
//!
//! The pipeline is a strictly forward chain of stages:
//! 1. **Planning** (`planner`) - classify category + complexity, rewrite the
//!    question into a canonical paragraph. Never fails; degrades to defaults.
//! 2. **Filter synthesis** (`synthesizer`) - derive a filter set from the
//!    caller-supplied field vocabulary only, validated against the schema.
//! 3. **Criteria compilation** - pure, in `askcrm_core::criteria`.
//! 4. **Record fetch** (`fetch`) - execute the compiled criteria and classify
//!    every raw gateway outcome into a disjoint error taxonomy.
//! 5. **Answer synthesis** (`summarizer`) - render records back into prose.
//!
//! # Safety principle
//!
//! The model is strictly a translator. It proposes category names and filter
//! sets; deterministic validation against the supplied vocabulary and the
//! fixed filter schema disposes. A generative step can never introduce a
//! field name that was not handed to it.

pub mod extract;
pub mod fetch;
pub mod gateway;
pub mod llm;
pub mod pipeline;
pub mod planner;
pub mod summarizer;
pub mod synthesizer;

pub use fetch::RecordFetcher;
pub use gateway::{DescriptorBundle, FieldDescriptorGateway, RecordStoreGateway};
pub use llm::LlmClient;
pub use pipeline::{Pipeline, PipelineState, RunOutcome, Stage};
pub use planner::{Plan, Planner};
pub use summarizer::{AnswerSynthesizer, IntentFlags, NO_MATCH_RESPONSE};
pub use synthesizer::FilterSynthesizer;
