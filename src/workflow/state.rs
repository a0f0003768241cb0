//! The state container threaded through every stage.
//!
//! Stages never mutate state in place: they return a [`StatePatch`] and
//! the orchestrator merges it with [`WorkflowState::apply`]. Scalar
//! fields overwrite; `history` and `audit_trail` append. A patch is
//! merged atomically before the router sees the state again.

use serde::{Deserialize, Serialize};

use crate::domain::{EmailInput, Turn, Vendor};
use crate::workflow::router::StageId;

/// Classified purpose of an inbound message. Closed set; anything the
/// classifier produces outside it is coerced to `Unrelated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    /// The vendor wants to change contact data.
    Update,
    /// Read-only question about an invoice.
    Status,
    /// Question about rules, terms, or compliance.
    Policy,
    /// Spam or out-of-domain mail.
    Unrelated,
}

impl Intent {
    /// Parse a classifier output. Returns `None` for anything outside
    /// the fixed set; the caller decides how to coerce.
    pub fn from_classifier_output(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "UPDATE" => Some(Self::Update),
            "STATUS" => Some(Self::Status),
            "POLICY" => Some(Self::Policy),
            "UNRELATED" => Some(Self::Unrelated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Status => "STATUS",
            Self::Policy => "POLICY",
            Self::Unrelated => "UNRELATED",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error record set when a stage fails fatally.
///
/// Once present, the orchestrator skips remaining business stages and
/// jumps straight to persistence.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: StageId,
    /// Human-readable reason, logged and carried for the caller.
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: StageId, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

// ── State container ─────────────────────────────────────────────────

/// Mutable record for one in-flight request.
///
/// Owned exclusively by the orchestrator loop; never shared across
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// The raw inbound payload. Set once, never mutated.
    pub input: EmailInput,
    /// Result of VerifyIdentity. Unset until that stage runs.
    pub authorized: Option<bool>,
    /// Vendor profile, present iff `authorized == Some(true)`.
    pub identity: Option<Vendor>,
    /// Conversation context, oldest-first, current message last.
    pub history: Vec<Turn>,
    /// Classified intent. Unset until ClassifyIntent runs.
    pub intent: Option<Intent>,
    /// Output of the SQL-backed executors (status lookup / update).
    pub structured_result: Option<String>,
    /// Output of the knowledge-retrieval executor.
    pub retrieved_context: Option<String>,
    /// The drafted reply. Empty until a drafting stage runs.
    pub reply: String,
    /// Stage-completion labels, append-only.
    pub audit_trail: Vec<String>,
    /// Fatal stage failure, if any.
    pub failure: Option<StageFailure>,
}

impl WorkflowState {
    /// Fresh state for an inbound email.
    pub fn new(input: EmailInput) -> Self {
        Self {
            input,
            authorized: None,
            identity: None,
            history: Vec::new(),
            intent: None,
            structured_result: None,
            retrieved_context: None,
            reply: String::new(),
            audit_trail: Vec::new(),
            failure: None,
        }
    }

    /// Merge a stage's patch. Scalars overwrite, sequences append.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(authorized) = patch.authorized {
            self.authorized = Some(authorized);
        }
        if let Some(identity) = patch.identity {
            self.identity = Some(identity);
        }
        self.history.extend(patch.history);
        if let Some(intent) = patch.intent {
            self.intent = Some(intent);
        }
        if let Some(result) = patch.structured_result {
            self.structured_result = Some(result);
        }
        if let Some(context) = patch.retrieved_context {
            self.retrieved_context = Some(context);
        }
        if let Some(reply) = patch.reply {
            self.reply = reply;
        }
        self.audit_trail.extend(patch.audit);
        if let Some(failure) = patch.failure {
            self.failure = Some(failure);
        }
    }

    /// Vendor display name for prompts; a neutral fallback when the
    /// sender is not in the vendor master.
    pub fn vendor_name(&self) -> &str {
        self.identity.as_ref().map(|v| v.name.as_str()).unwrap_or("Vendor")
    }

    /// Collapse the final state into the boundary response.
    pub fn into_output(self) -> crate::domain::AgentOutput {
        crate::domain::AgentOutput {
            reply: self.reply,
            action_summary: self.audit_trail.join(", "),
            authorized: self.authorized.unwrap_or(false),
        }
    }
}

// ── Patch ───────────────────────────────────────────────────────────

/// Sparse set of field assignments produced by one stage.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub authorized: Option<bool>,
    pub identity: Option<Vendor>,
    /// Turns to append to `history`.
    pub history: Vec<Turn>,
    pub intent: Option<Intent>,
    pub structured_result: Option<String>,
    pub retrieved_context: Option<String>,
    pub reply: Option<String>,
    /// Labels to append to `audit_trail`.
    pub audit: Vec<String>,
    pub failure: Option<StageFailure>,
}

impl StatePatch {
    /// A patch carrying only an audit label.
    pub fn audit(label: impl Into<String>) -> Self {
        Self {
            audit: vec![label.into()],
            ..Default::default()
        }
    }

    /// Add an audit label to this patch.
    pub fn with_audit(mut self, label: impl Into<String>) -> Self {
        self.audit.push(label.into());
        self
    }
}
