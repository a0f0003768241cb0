//! Knowledge retrieval executor — policy questions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::RetrievalError;
use crate::retrieval::{RetrievalIndex, RetrievedChunk};
use crate::workflow::router::StageId;
use crate::workflow::stages::Stage;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

const NO_DOCUMENTS: &str = "No relevant policy documents found.";
const EMPTY_INDEX: &str = "Policy index is currently empty. Cannot retrieve information.";
const RETRIEVAL_ERROR: &str = "Error retrieving policy information.";

/// Queries the knowledge index with the inbound message body.
///
/// Both an empty index and a query with no matches are ordinary results
/// with distinct user-facing strings; only the strings differ.
pub struct ExecuteKnowledgeRetrieval {
    index: Arc<dyn RetrievalIndex>,
    k: usize,
}

impl ExecuteKnowledgeRetrieval {
    pub fn new(index: Arc<dyn RetrievalIndex>, k: usize) -> Self {
        Self { index, k }
    }
}

#[async_trait]
impl Stage for ExecuteKnowledgeRetrieval {
    fn id(&self) -> StageId {
        StageId::ExecuteKnowledgeRetrieval
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let context = match self.index.query(&state.input.body, self.k).await {
            Ok(chunks) if chunks.is_empty() => NO_DOCUMENTS.to_string(),
            Ok(chunks) => {
                info!(
                    request_id = %ctx.request_id,
                    chunks = chunks.len(),
                    "Retrieved policy context"
                );
                format_chunks(&chunks)
            }
            Err(RetrievalError::EmptyIndex) => {
                warn!(request_id = %ctx.request_id, "Retrieval skipped: index is empty");
                EMPTY_INDEX.to_string()
            }
            Err(e) => {
                warn!(request_id = %ctx.request_id, error = %e, "Retrieval failed");
                RETRIEVAL_ERROR.to_string()
            }
        };

        Ok(StatePatch {
            retrieved_context: Some(context),
            ..Default::default()
        }
        .with_audit("knowledge_retrieved"))
    }
}

/// Label each excerpt with its source so the drafter can cite it.
fn format_chunks(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let content = chunk.content.replace('\n', " ");
            let page = chunk
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                "[Excerpt {} from {} (Page {})]:\n{}",
                i + 1,
                chunk.source,
                page,
                content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
