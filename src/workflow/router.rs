//! Routing policy — pure functions from merged state to the next stage.
//!
//! The stage graph is a DAG with one conditional fan-out after identity
//! verification and one four-way fan-out after classification. Every
//! stage runs at most once per request; PersistInteraction is terminal.

use serde::{Deserialize, Serialize};

use crate::workflow::state::{Intent, WorkflowState};

/// Closed set of stage identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    VerifyIdentity,
    LoadContext,
    ClassifyIntent,
    ExecuteStatusLookup,
    ExecuteUpdate,
    ExecuteKnowledgeRetrieval,
    DraftReply,
    DraftRejection,
    PersistInteraction,
}

impl StageId {
    /// Snake-case label for logs and failure records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VerifyIdentity => "verify_identity",
            Self::LoadContext => "load_context",
            Self::ClassifyIntent => "classify_intent",
            Self::ExecuteStatusLookup => "execute_status_lookup",
            Self::ExecuteUpdate => "execute_update",
            Self::ExecuteKnowledgeRetrieval => "execute_knowledge_retrieval",
            Self::DraftReply => "draft_reply",
            Self::DraftRejection => "draft_rejection",
            Self::PersistInteraction => "persist_interaction",
        }
    }

    /// True for the terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PersistInteraction)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Every request starts at identity verification.
pub const INITIAL_STAGE: StageId = StageId::VerifyIdentity;

/// Select the stage that follows `completed`, given fully-merged state.
///
/// Returns `None` once the terminal stage has run. The match is
/// exhaustive over `StageId`, so an unroutable stage cannot exist.
pub fn next_stage(completed: StageId, state: &WorkflowState) -> Option<StageId> {
    use StageId::*;

    match completed {
        VerifyIdentity => {
            if state.authorized == Some(true) {
                Some(LoadContext)
            } else {
                Some(DraftRejection)
            }
        }
        LoadContext => Some(ClassifyIntent),
        ClassifyIntent => Some(match state.intent {
            Some(Intent::Status) => ExecuteStatusLookup,
            Some(Intent::Update) => ExecuteUpdate,
            Some(Intent::Policy) => ExecuteKnowledgeRetrieval,
            // Unrelated (and a missing intent, which ClassifyIntent's
            // coercion rules out) bypasses every executor.
            Some(Intent::Unrelated) | None => DraftReply,
        }),
        ExecuteStatusLookup | ExecuteUpdate | ExecuteKnowledgeRetrieval => Some(DraftReply),
        DraftReply | DraftRejection => Some(PersistInteraction),
        PersistInteraction => None,
    }
}
