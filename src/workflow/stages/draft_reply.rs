//! Reply drafting — the one stage whose collaborator failure is fatal.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::context::RequestContext;
use crate::domain::Turn;
use crate::llm::prompts::drafter_system_prompt;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::workflow::router::StageId;
use crate::workflow::stages::{Stage, turns_to_messages};
use crate::workflow::state::{Intent, StageFailure, StatePatch, WorkflowState};

/// Temperature for drafting — a little looser for writing flow.
const DRAFT_TEMPERATURE: f32 = 0.3;
const DRAFT_MAX_TOKENS: u32 = 1024;

/// Drafts the outbound reply from the gathered data context.
///
/// A model failure here propagates as a `StageFailure`: the workflow
/// never fabricates a reply out of nothing.
pub struct DraftReply {
    llm: Arc<dyn LlmProvider>,
}

impl DraftReply {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for DraftReply {
    fn id(&self) -> StageId {
        StageId::DraftReply
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let intent = state.intent.unwrap_or(Intent::Unrelated);
        let data_context = select_data_context(state, intent);

        let system = drafter_system_prompt(state.vendor_name(), intent, &data_context);
        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(turns_to_messages(&state.history));

        let request = CompletionRequest::new(messages)
            .with_temperature(DRAFT_TEMPERATURE)
            .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| StageFailure::new(self.id(), format!("model call failed: {e}")))?;

        let reply = response.content.trim().to_string();
        info!(
            request_id = %ctx.request_id,
            chars = reply.len(),
            "Draft generated"
        );

        Ok(StatePatch {
            reply: Some(reply.clone()),
            history: vec![Turn::assistant(reply)],
            ..Default::default()
        }
        .with_audit("reply_drafted"))
    }
}

/// Pick the fact source the drafter grounds on, by intent.
fn select_data_context(state: &WorkflowState, intent: Intent) -> String {
    match intent {
        Intent::Status | Intent::Update => state
            .structured_result
            .clone()
            .unwrap_or_else(|| "Action completed, but no specific details returned.".to_string()),
        Intent::Policy => state
            .retrieved_context
            .clone()
            .unwrap_or_else(|| "No relevant policy documents found.".to_string()),
        Intent::Unrelated => {
            "The vendor asked something unrelated to invoices or policies.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmailInput;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, FinishReason};
    use rust_decimal::Decimal;

    struct ScriptedLlm {
        reply: Result<&'static str, ()>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            // The drafter prompt carries the data context inline.
            assert!(request.messages[0].content.contains("Retrieved Data"));
            match self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: "down".into(),
                }),
            }
        }
    }

    fn state_with(intent: Intent, structured: Option<&str>, retrieved: Option<&str>) -> WorkflowState {
        let mut state = WorkflowState::new(EmailInput {
            id: "m1".into(),
            thread_id: "t1".into(),
            sender: "a@b.com".into(),
            subject: "s".into(),
            body: "question".into(),
        });
        state.apply(StatePatch {
            intent: Some(intent),
            structured_result: structured.map(str::to_string),
            retrieved_context: retrieved.map(str::to_string),
            history: vec![Turn::user("question")],
            ..Default::default()
        });
        state
    }

    #[tokio::test]
    async fn drafted_reply_lands_in_patch_and_history() {
        let stage = DraftReply::new(Arc::new(ScriptedLlm {
            reply: Ok("Dear Vendor, your invoice is pending."),
        }));
        let state = state_with(Intent::Status, Some("Invoice INV-1: Pending"), None);
        let patch = stage.run(&state, &RequestContext::new("m1", "t1")).await.unwrap();

        assert_eq!(patch.reply.as_deref(), Some("Dear Vendor, your invoice is pending."));
        assert_eq!(patch.history.len(), 1);
        assert_eq!(patch.history[0].role, crate::domain::TurnRole::Assistant);
        assert_eq!(patch.audit, vec!["reply_drafted".to_string()]);
    }

    #[tokio::test]
    async fn model_failure_is_fatal() {
        let stage = DraftReply::new(Arc::new(ScriptedLlm { reply: Err(()) }));
        let state = state_with(Intent::Status, Some("data"), None);
        let failure = stage.run(&state, &RequestContext::new("m1", "t1")).await.unwrap_err();
        assert_eq!(failure.stage, StageId::DraftReply);
    }

    #[test]
    fn data_context_follows_intent() {
        let state = state_with(Intent::Policy, Some("sql"), Some("policy text"));
        assert_eq!(select_data_context(&state, Intent::Policy), "policy text");
        assert_eq!(select_data_context(&state, Intent::Status), "sql");
        assert!(select_data_context(&state, Intent::Unrelated).contains("unrelated"));
    }

    #[test]
    fn missing_executor_output_gets_placeholder() {
        let state = state_with(Intent::Status, None, None);
        assert!(select_data_context(&state, Intent::Status).contains("no specific details"));
    }
}
