use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use askcrm_agent::pipeline::Pipeline;

#[derive(Clone)]
pub struct ChatState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: Option<String>,
    pub tool_output: Value,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(ChatState { pipeline })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<Value>)> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "query must not be blank"})),
        ));
    }

    info!(event_name = "server.chat.received", query_chars = query.len(), "chat query accepted");
    let outcome = state.pipeline.run(query).await;

    Ok(Json(QueryResponse { response: outcome.response, tool_output: outcome.tool_output }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use serde_json::{json, Value};

    use askcrm_agent::gateway::{DescriptorBundle, FieldDescriptorGateway, RecordStoreGateway};
    use askcrm_agent::llm::LlmClient;
    use askcrm_agent::pipeline::Pipeline;
    use askcrm_core::literature::{Category, Complexity};

    use super::{chat, ChatState, QueryRequest};

    struct CannedLlm;

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String> {
            Ok(r#"{"filters": [{"key": "Amount", "value": {"operator": "greater_than", "value": 1}}]}"#.to_string())
        }
    }

    struct CannedDescriptors;

    #[async_trait]
    impl FieldDescriptorGateway for CannedDescriptors {
        async fn describe(
            &self,
            _query: &str,
            _category: Category,
            _complexity: Complexity,
        ) -> Result<DescriptorBundle> {
            Ok(DescriptorBundle {
                hints: vec!["Amount: deal value".to_string()],
                ..DescriptorBundle::default()
            })
        }
    }

    struct CannedStore;

    #[async_trait]
    impl RecordStoreGateway for CannedStore {
        async fn search(
            &self,
            _category: Category,
            _criteria: &str,
            _page_size: u32,
        ) -> Result<Value> {
            Ok(json!({"results": {"data": []}}))
        }
    }

    fn state() -> ChatState {
        ChatState {
            pipeline: Arc::new(Pipeline::new(
                Arc::new(CannedLlm),
                Arc::new(CannedDescriptors),
                Arc::new(CannedStore),
                15,
                Duration::from_secs(5),
            )),
        }
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_the_pipeline_runs() {
        let result =
            chat(State(state()), Json(QueryRequest { query: "   ".to_string() })).await;
        let (status, _) = result.err().expect("blank query must be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pipeline_outcome_flows_through_the_handler() {
        let Json(payload) = chat(State(state()), Json(QueryRequest { query: "deals".to_string() }))
            .await
            .expect("well-formed query must be accepted");

        // The canned store returns no records, so the run reports that kind.
        assert!(payload.response.is_none());
        assert_eq!(payload.tool_output["kind"], "upstream_no_records");
    }
}
