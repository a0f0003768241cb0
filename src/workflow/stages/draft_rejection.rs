//! Security rejection — fixed template, no model call.

use async_trait::async_trait;
use tracing::info;

use crate::context::RequestContext;
use crate::domain::Turn;
use crate::workflow::router::StageId;
use crate::workflow::stages::Stage;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

/// The verbatim reply every unverified sender receives.
pub const REJECTION_TEMPLATE: &str = "\
Dear Sender,

We could not verify your email address in our Vendor Master database. \
For security reasons, we cannot process your request.

Please contact support@agentia.com if you believe this is an error.

Best regards,
Agentia Security Team";

/// Emits the fixed rejection reply. Deterministic; no collaborator.
pub struct DraftRejection;

impl DraftRejection {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DraftRejection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DraftRejection {
    fn id(&self) -> StageId {
        StageId::DraftRejection
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        info!(request_id = %ctx.request_id, "Drafting security rejection");
        Ok(StatePatch {
            reply: Some(REJECTION_TEMPLATE.to_string()),
            history: vec![Turn::assistant(REJECTION_TEMPLATE)],
            ..Default::default()
        }
        .with_audit("rejection_drafted"))
    }
}
