//! Intent classification.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::llm::prompts::CLASSIFIER_SYSTEM_PROMPT;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::workflow::router::StageId;
use crate::workflow::stages::{DETERMINISTIC_TEMPERATURE, Stage, turns_to_messages};
use crate::workflow::state::{Intent, StageFailure, StatePatch, WorkflowState};

/// Max tokens for the classifier call — the answer is one word.
const CLASSIFY_MAX_TOKENS: u32 = 16;

/// Classifies the conversation into one of the four fixed intents.
///
/// Anything the model produces outside the set — and any model failure —
/// coerces to `Unrelated`, so this stage never blocks the request.
pub struct ClassifyIntent {
    llm: Arc<dyn LlmProvider>,
}

impl ClassifyIntent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for ClassifyIntent {
    fn id(&self) -> StageId {
        StageId::ClassifyIntent
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let mut messages = vec![ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT)];
        messages.extend(turns_to_messages(&state.history));

        let request = CompletionRequest::new(messages)
            .with_temperature(DETERMINISTIC_TEMPERATURE)
            .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let intent = match self.llm.complete(request).await {
            Ok(response) => {
                let raw = response.content.trim().to_uppercase();
                Intent::from_classifier_output(&raw).unwrap_or_else(|| {
                    warn!(
                        request_id = %ctx.request_id,
                        raw = %raw,
                        "Classifier produced an out-of-set intent, coercing to UNRELATED"
                    );
                    Intent::Unrelated
                })
            }
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Classifier call failed, coercing to UNRELATED"
                );
                Intent::Unrelated
            }
        };

        info!(request_id = %ctx.request_id, intent = %intent, "Intent classified");

        Ok(StatePatch {
            intent: Some(intent),
            ..Default::default()
        }
        .with_audit(format!("classified_as_{}", intent.as_str().to_lowercase())))
    }
}
