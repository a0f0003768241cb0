//! Context loading — seeds the prompt window from stored history.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::domain::Turn;
use crate::store::HistoryStore;
use crate::workflow::router::StageId;
use crate::workflow::stages::Stage;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

/// Loads the most recent prior turns of the thread, oldest-first, and
/// appends the current message last.
///
/// A history-store error degrades to an empty window; the request
/// continues with just the current message.
pub struct LoadContext {
    history: Arc<dyn HistoryStore>,
    limit: usize,
}

impl LoadContext {
    pub fn new(history: Arc<dyn HistoryStore>, limit: usize) -> Self {
        Self { history, limit }
    }
}

#[async_trait]
impl Stage for LoadContext {
    fn id(&self) -> StageId {
        StageId::LoadContext
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let thread_id = &state.input.thread_id;

        // The store hands back newest-first; the prompt window wants
        // oldest-first.
        let mut turns = match self.history.recent_turns(thread_id, self.limit).await {
            Ok(turns) => {
                let mut turns = turns;
                turns.reverse();
                turns
            }
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "History load failed, continuing with empty context"
                );
                Vec::new()
            }
        };

        debug!(
            request_id = %ctx.request_id,
            prior_turns = turns.len(),
            "Context loaded"
        );

        // The current inbound message always closes the window.
        turns.push(Turn::user(state.input.body.clone()));

        Ok(StatePatch {
            history: turns,
            ..Default::default()
        }
        .with_audit("context_loaded"))
    }
}
