//! Update executor — the only stage that writes to the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::llm::LlmProvider;
use crate::store::traits::ALLOWED_UPDATE_FIELDS;
use crate::store::{LedgerExport, LedgerStore};
use crate::workflow::router::StageId;
use crate::workflow::stages::{Stage, extract_entity};
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

const UPDATE_EXTRACTION: &str =
    "The field to update (phone/name/category/address/contact_name) and the new value. \
     Format: 'FIELD:VALUE'";

const UNPARSEABLE_UPDATE: &str =
    "I could not determine what you want to update. Please specify the field and the new value.";

/// Extracts a `FIELD:VALUE` instruction, validates it against the
/// allow-list, applies it, and triggers the ledger re-export.
///
/// Every validation failure becomes a user-facing rejection string in
/// `structured_result`; the stage itself always succeeds.
pub struct ExecuteUpdate {
    llm: Arc<dyn LlmProvider>,
    ledger: Arc<dyn LedgerStore>,
    export: Arc<dyn LedgerExport>,
    min_phone_digits: usize,
}

impl ExecuteUpdate {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        ledger: Arc<dyn LedgerStore>,
        export: Arc<dyn LedgerExport>,
        min_phone_digits: usize,
    ) -> Self {
        Self {
            llm,
            ledger,
            export,
            min_phone_digits,
        }
    }

    async fn apply_update(
        &self,
        vendor_id: i64,
        field: &str,
        value: &str,
        ctx: &RequestContext,
    ) -> String {
        match self.ledger.update_vendor_field(vendor_id, field, value).await {
            Ok(affected) if affected > 0 => {
                info!(request_id = %ctx.request_id, field, "Vendor field updated");
                // Keep the external ledger file in step with the store.
                // An export failure is an operator problem, not the
                // vendor's: log and move on.
                if let Err(e) = self.export.export().await {
                    warn!(request_id = %ctx.request_id, error = %e, "Ledger re-export failed");
                }
                format!("Successfully updated your {field} to '{value}'.")
            }
            Ok(_) => "Update failed. Vendor record not found.".to_string(),
            Err(e) => {
                warn!(request_id = %ctx.request_id, error = %e, "Vendor update failed");
                "System error during update.".to_string()
            }
        }
    }
}

#[async_trait]
impl Stage for ExecuteUpdate {
    fn id(&self) -> StageId {
        StageId::ExecuteUpdate
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let Some(vendor) = state.identity.as_ref() else {
            return Err(StageFailure::new(
                self.id(),
                "executor ran without an authorized vendor",
            ));
        };

        let extracted = match extract_entity(&self.llm, &state.history, UPDATE_EXTRACTION).await {
            Ok(value) => value,
            Err(e) => {
                warn!(request_id = %ctx.request_id, error = %e, "Update extraction call failed");
                String::new()
            }
        };

        let result = match parse_update_instruction(&extracted) {
            None => UNPARSEABLE_UPDATE.to_string(),
            Some((field, value)) => {
                if !ALLOWED_UPDATE_FIELDS.contains(&field.as_str()) {
                    warn!(request_id = %ctx.request_id, field = %field, "Disallowed update field");
                    format!("Update rejected: changing field '{field}' is not permitted.")
                } else if field == "phone" {
                    match normalize_phone(&value, self.min_phone_digits) {
                        Some(clean) => self.apply_update(vendor.id, &field, &clean, ctx).await,
                        None => {
                            format!("Update rejected: phone number '{value}' is invalid.")
                        }
                    }
                } else {
                    self.apply_update(vendor.id, &field, &value, ctx).await
                }
            }
        };

        Ok(StatePatch {
            structured_result: Some(result),
            ..Default::default()
        }
        .with_audit("update_attempted"))
    }
}

/// Split a `FIELD:VALUE` instruction. Returns `None` when there is no
/// colon or either side is empty.
fn parse_update_instruction(extracted: &str) -> Option<(String, String)> {
    let (field, value) = extracted.split_once(':')?;
    let field = field.trim().to_lowercase();
    let value = value.trim().to_string();
    if field.is_empty() || value.is_empty() {
        return None;
    }
    Some((field, value))
}

/// Strip a phone value to digits only. `None` when too few digits remain.
pub(crate) fn normalize_phone(raw: &str, min_digits: usize) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < min_digits {
        return None;
    }
    Some(digits)
}
