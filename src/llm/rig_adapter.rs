//! Bridges rig's `CompletionModel` trait to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};

/// Adapter wrapping a rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::cost_per_token(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // System messages become the preamble; the final chat message is
        // the prompt and everything between is history.
        let mut preamble_parts: Vec<String> = Vec::new();
        let mut chat: Vec<Message> = Vec::new();

        for message in request.messages {
            match message.role {
                ChatRole::System => preamble_parts.push(message.content),
                ChatRole::User => chat.push(Message::user(message.content)),
                ChatRole::Assistant => chat.push(Message::assistant(message.content)),
            }
        }

        let prompt = chat.pop().unwrap_or_else(|| Message::user(String::new()));

        let mut builder = self.model.completion_request(prompt);
        if !preamble_parts.is_empty() {
            builder = builder.preamble(preamble_parts.join("\n\n"));
        }
        if !chat.is_empty() {
            builder = builder.messages(chat);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .into_iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "empty completion".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}
