//! Stage implementations.
//!
//! Every stage reads the shared state, talks to at most its own
//! collaborator, and returns a [`StatePatch`]. Only drafting may fail
//! fatally; everything else degrades to a safe default patch.

mod classify_intent;
mod draft_rejection;
mod draft_reply;
mod execute_retrieval;
mod execute_status;
mod execute_update;
mod load_context;
mod persist;
mod verify_identity;

pub use classify_intent::ClassifyIntent;
pub use draft_rejection::{DraftRejection, REJECTION_TEMPLATE};
pub use draft_reply::DraftReply;
pub use execute_retrieval::ExecuteKnowledgeRetrieval;
pub use execute_status::ExecuteStatusLookup;
pub use execute_update::ExecuteUpdate;
pub use load_context::LoadContext;
pub use persist::PersistInteraction;
pub use verify_identity::VerifyIdentity;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::domain::{Turn, TurnRole};
use crate::error::LlmError;
use crate::llm::prompts::EXTRACTION_SYSTEM_PROMPT;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::workflow::router::StageId;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

/// Temperature for deterministic calls (classification, extraction).
pub(crate) const DETERMINISTIC_TEMPERATURE: f32 = 0.0;

/// Max tokens for extraction calls (single short values).
pub(crate) const EXTRACTION_MAX_TOKENS: u32 = 128;

/// One atomic state-transform step in the workflow.
#[async_trait]
pub trait Stage: Send + Sync {
    /// This stage's identifier in the router graph.
    fn id(&self) -> StageId;

    /// Run the stage against read-only state, returning a patch.
    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure>;
}

/// Map conversation turns into chat messages for a prompt.
pub(crate) fn turns_to_messages(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => ChatMessage::user(turn.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        })
        .collect()
}

/// Extract a single entity from the conversation via a deterministic
/// model call. Returns the raw value, quotes stripped; the model answers
/// `NOT_FOUND` when it cannot find one.
pub(crate) async fn extract_entity(
    llm: &Arc<dyn LlmProvider>,
    history: &[Turn],
    instruction: &str,
) -> Result<String, LlmError> {
    let mut messages = vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::system(format!("Extract: {instruction}")),
    ];
    messages.extend(turns_to_messages(history));

    let request = CompletionRequest::new(messages)
        .with_temperature(DETERMINISTIC_TEMPERATURE)
        .with_max_tokens(EXTRACTION_MAX_TOKENS);

    let response = llm.complete(request).await?;
    Ok(response.content.trim().replace(['\'', '"'], ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_map_to_matching_roles() {
        let history = vec![Turn::user("hello"), Turn::assistant("hi there")];
        let messages = turns_to_messages(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert!(matches!(messages[0].role, crate::llm::ChatRole::User));
        assert!(matches!(messages[1].role, crate::llm::ChatRole::Assistant));
    }
}
