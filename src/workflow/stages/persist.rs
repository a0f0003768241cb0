//! Persistence — the terminal stage.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::domain::Turn;
use crate::store::HistoryStore;
use crate::workflow::router::StageId;
use crate::workflow::stages::Stage;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

/// Writes the interaction to the history store: exactly one user turn,
/// and one assistant turn iff a reply exists.
///
/// Store errors are logged and swallowed: persistence never blocks the
/// reply from reaching the caller.
pub struct PersistInteraction {
    history: Arc<dyn HistoryStore>,
}

impl PersistInteraction {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Stage for PersistInteraction {
    fn id(&self) -> StageId {
        StageId::PersistInteraction
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let thread_id = &state.input.thread_id;

        if let Err(e) = self
            .history
            .append_turn(thread_id, &Turn::user(state.input.body.clone()))
            .await
        {
            warn!(request_id = %ctx.request_id, error = %e, "Failed to persist user turn");
        }

        if !state.reply.is_empty() {
            if let Err(e) = self
                .history
                .append_turn(thread_id, &Turn::assistant(state.reply.clone()))
                .await
            {
                warn!(request_id = %ctx.request_id, error = %e, "Failed to persist assistant turn");
            }
        }

        info!(request_id = %ctx.request_id, thread_id = %thread_id, "Interaction persisted");
        Ok(StatePatch::audit("interaction_persisted"))
    }
}
