//! Per-request context threaded through every stage and collaborator call.
//!
//! Carries the correlation identifiers stages log with, so there is no
//! global logging state anywhere in the workflow.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Context for one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, unique per inbound email.
    pub request_id: Uuid,
    /// Conversation thread the email belongs to.
    pub thread_id: String,
    /// Channel-native message id.
    pub message_id: String,
    /// When the request entered the workflow.
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for an inbound email.
    pub fn new(message_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            received_at: Utc::now(),
        }
    }

    /// A tracing span covering the whole request.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            thread_id = %self.thread_id,
        )
    }
}
