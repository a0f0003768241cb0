//! The orchestrator — drives one request through the stage graph.

use std::sync::Arc;

use tracing::{Instrument, error, info};

use crate::context::RequestContext;
use crate::domain::EmailInput;
use crate::llm::LlmProvider;
use crate::retrieval::RetrievalIndex;
use crate::store::{HistoryStore, IdentityStore, LedgerExport, LedgerStore};
use crate::workflow::router::{self, StageId};
use crate::workflow::stages::{
    ClassifyIntent, DraftRejection, DraftReply, ExecuteKnowledgeRetrieval, ExecuteStatusLookup,
    ExecuteUpdate, LoadContext, PersistInteraction, Stage, VerifyIdentity,
};
use crate::workflow::state::{StatePatch, WorkflowState};

/// Reply used when drafting itself fails. The caller still gets a reply
/// string; the failure record carries the detail.
pub const SYSTEM_ERROR_REPLY: &str = "\
Dear Sender,

We were unable to process your request due to a temporary system issue. \
Please try again later, or contact support@agentia.com if the problem persists.

Best regards,
Agentia Vendor Team";

/// Collaborators injected into the workflow at startup.
///
/// Everything is an `Arc<dyn …>` so tests substitute fakes freely and
/// nothing is process-global.
pub struct WorkflowDeps {
    pub identity: Arc<dyn IdentityStore>,
    pub history: Arc<dyn HistoryStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub ledger_export: Arc<dyn LedgerExport>,
    pub index: Arc<dyn RetrievalIndex>,
    pub llm: Arc<dyn LlmProvider>,
}

/// Workflow tuning knobs, split from the process [`crate::config::Config`]
/// so the orchestrator stays constructible in tests.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Prior turns pulled into the prompt window.
    pub history_limit: usize,
    /// Chunks returned per knowledge query.
    pub retrieval_k: usize,
    /// Minimum digits for a normalized phone number.
    pub min_phone_digits: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            history_limit: 5,
            retrieval_k: 3,
            min_phone_digits: 10,
        }
    }
}

/// Executes stages in router order for a single request.
///
/// Guarantees: stages run strictly sequentially; a patch is fully merged
/// before the next stage is selected; PersistInteraction runs exactly
/// once per request, on every path, failure or not.
pub struct Orchestrator {
    verify_identity: VerifyIdentity,
    load_context: LoadContext,
    classify_intent: ClassifyIntent,
    execute_status: ExecuteStatusLookup,
    execute_update: ExecuteUpdate,
    execute_retrieval: ExecuteKnowledgeRetrieval,
    draft_reply: DraftReply,
    draft_rejection: DraftRejection,
    persist: PersistInteraction,
}

impl Orchestrator {
    pub fn new(config: WorkflowConfig, deps: WorkflowDeps) -> Self {
        Self {
            verify_identity: VerifyIdentity::new(Arc::clone(&deps.identity)),
            load_context: LoadContext::new(Arc::clone(&deps.history), config.history_limit),
            classify_intent: ClassifyIntent::new(Arc::clone(&deps.llm)),
            execute_status: ExecuteStatusLookup::new(
                Arc::clone(&deps.llm),
                Arc::clone(&deps.ledger),
            ),
            execute_update: ExecuteUpdate::new(
                Arc::clone(&deps.llm),
                Arc::clone(&deps.ledger),
                Arc::clone(&deps.ledger_export),
                config.min_phone_digits,
            ),
            execute_retrieval: ExecuteKnowledgeRetrieval::new(
                Arc::clone(&deps.index),
                config.retrieval_k,
            ),
            draft_reply: DraftReply::new(Arc::clone(&deps.llm)),
            draft_rejection: DraftRejection::new(),
            persist: PersistInteraction::new(Arc::clone(&deps.history)),
        }
    }

    /// Run one inbound email to completion and return the final state.
    pub async fn run(&self, input: EmailInput) -> WorkflowState {
        let ctx = RequestContext::new(&input.id, &input.thread_id);
        let span = ctx.span();
        self.run_with_context(input, ctx).instrument(span).await
    }

    async fn run_with_context(&self, input: EmailInput, ctx: RequestContext) -> WorkflowState {
        info!(sender = %input.sender, subject = %input.subject, "Workflow started");

        let mut state = WorkflowState::new(input);
        let mut current = router::INITIAL_STAGE;

        loop {
            match self.dispatch(current, &state, &ctx).await {
                Ok(patch) => {
                    state.apply(patch);
                }
                Err(failure) => {
                    error!(stage = %failure.stage, reason = %failure.message, "Stage failed");

                    if current.is_terminal() {
                        // Persistence trouble is logged by the stage; the
                        // reply still goes back to the caller.
                        state.apply(StatePatch {
                            failure: Some(failure),
                            ..Default::default()
                        });
                        break;
                    }

                    // Short-circuit the remaining business stages, but
                    // never persistence. The caller always gets a reply.
                    let fallback_reply = if state.reply.is_empty() {
                        Some(SYSTEM_ERROR_REPLY.to_string())
                    } else {
                        None
                    };
                    state.apply(StatePatch {
                        failure: Some(failure),
                        reply: fallback_reply,
                        ..Default::default()
                    });
                    current = StageId::PersistInteraction;
                    continue;
                }
            }

            match router::next_stage(current, &state) {
                Some(next) => current = next,
                None => break,
            }
        }

        info!(
            authorized = state.authorized.unwrap_or(false),
            intent = state.intent.map(|i| i.as_str()).unwrap_or("-"),
            failed = state.failure.is_some(),
            "Workflow finished"
        );
        state
    }

    async fn dispatch(
        &self,
        id: StageId,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, crate::workflow::state::StageFailure> {
        match id {
            StageId::VerifyIdentity => self.verify_identity.run(state, ctx).await,
            StageId::LoadContext => self.load_context.run(state, ctx).await,
            StageId::ClassifyIntent => self.classify_intent.run(state, ctx).await,
            StageId::ExecuteStatusLookup => self.execute_status.run(state, ctx).await,
            StageId::ExecuteUpdate => self.execute_update.run(state, ctx).await,
            StageId::ExecuteKnowledgeRetrieval => self.execute_retrieval.run(state, ctx).await,
            StageId::DraftReply => self.draft_reply.run(state, ctx).await,
            StageId::DraftRejection => self.draft_rejection.run(state, ctx).await,
            StageId::PersistInteraction => self.persist.run(state, ctx).await,
        }
    }
}
