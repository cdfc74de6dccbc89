use thiserror::Error;

use crate::filter::FilterError;

/// Terminal pipeline failure classifications.
///
/// Planning degradation never appears here: the planner absorbs its own
/// failures and falls back to defaults. Every other stage propagates one of
/// these verbatim as the run's terminal result; no stage retries another.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("requested field is not available: {detail}")]
    FieldNotFound { detail: String },
    #[error("filter failed schema validation: {0}")]
    FilterSchemaViolation(#[from] FilterError),
    #[error("upstream response was not decodable: {raw}")]
    UpstreamUnparseable { raw: String },
    #[error("record store returned an empty response for criteria `{criteria}`")]
    UpstreamEmpty { criteria: String },
    #[error("record store reported an error for criteria `{criteria}`: {detail}")]
    UpstreamErrorField { criteria: String, detail: String },
    #[error("no records matched criteria `{criteria}`")]
    UpstreamNoRecords { criteria: String },
    #[error("completion call failed: {detail}")]
    CompletionFailed { detail: String },
    #[error("stage `{stage}` timed out after {timeout_secs}s")]
    StageTimeout { stage: &'static str, timeout_secs: u64 },
}

impl PipelineError {
    /// Stable machine-readable kind carried in the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FieldNotFound { .. } => "field_not_found",
            Self::FilterSchemaViolation(_) => "filter_schema_violation",
            Self::UpstreamUnparseable { .. } => "upstream_unparseable",
            Self::UpstreamEmpty { .. } => "upstream_empty",
            Self::UpstreamErrorField { .. } => "upstream_error_field",
            Self::UpstreamNoRecords { .. } => "upstream_no_records",
            Self::CompletionFailed { .. } => "completion_failed",
            Self::StageTimeout { .. } => "stage_timeout",
        }
    }
}
