//! Status lookup executor — read-only invoice queries.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::domain::{Invoice, Vendor};
use crate::llm::LlmProvider;
use crate::store::LedgerStore;
use crate::workflow::router::StageId;
use crate::workflow::stages::{Stage, extract_entity};
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

const INVOICE_EXTRACTION: &str =
    "The invoice number (e.g. INV-123) mentioned by the vendor. If several or none \
     are clearly meant, return NOT_FOUND.";

/// Looks up one invoice (or the vendor's pending list) and formats the
/// full data context for the drafter.
///
/// A missing invoice is an informative string, never an error. An
/// ambiguous or absent invoice number falls back to the pending list.
pub struct ExecuteStatusLookup {
    llm: Arc<dyn LlmProvider>,
    ledger: Arc<dyn LedgerStore>,
}

impl ExecuteStatusLookup {
    pub fn new(llm: Arc<dyn LlmProvider>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { llm, ledger }
    }

    async fn pending_summary(&self, vendor: &Vendor, ctx: &RequestContext) -> String {
        match self.ledger.pending_invoices(vendor.id).await {
            Ok(pending) if !pending.is_empty() => {
                let lines: Vec<String> = pending
                    .iter()
                    .map(|inv| {
                        format!(
                            "- {}: {} {} (Due: {})",
                            inv.invoice_number,
                            inv.amount,
                            inv.currency,
                            display_date(inv.due_date),
                        )
                    })
                    .collect();
                format!("Here are your pending invoices:\n{}", lines.join("\n"))
            }
            Ok(_) => "I could not identify a specific invoice, and you have no pending invoices."
                .to_string(),
            Err(e) => {
                warn!(request_id = %ctx.request_id, error = %e, "Pending invoice lookup failed");
                "I could not identify a specific invoice, and you have no pending invoices."
                    .to_string()
            }
        }
    }
}

#[async_trait]
impl Stage for ExecuteStatusLookup {
    fn id(&self) -> StageId {
        StageId::ExecuteStatusLookup
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

        let extracted = match extract_entity(&self.llm, &state.history, INVOICE_EXTRACTION).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Invoice extraction call failed, falling back to pattern scan"
                );
                "NOT_FOUND".to_string()
            }
        };

        // Extraction may miss numbers the vendor wrote plainly; a pattern
        // scan of the current message covers that before giving up.
        let invoice_number = if extracted.contains("NOT_FOUND") {
            extract_invoice_number(&state.input.body)
        } else {
            Some(extracted)
        };

        let result = match invoice_number {
            Some(number) => {
                info!(request_id = %ctx.request_id, invoice = %number, "Fetching invoice data");
                match self.ledger.invoice_status(&number, vendor.id).await {
                    Ok(Some(invoice)) => format_invoice_context(&invoice, vendor),
                    Ok(None) => format!("Invoice {number} not found in our records."),
                    Err(e) => {
                        warn!(request_id = %ctx.request_id, error = %e, "Invoice lookup failed");
                        format!("Invoice {number} not found in our records.")
                    }
                }
            }
            None => self.pending_summary(vendor, ctx).await,
        };

        Ok(StatePatch {
            structured_result: Some(result),
            ..Default::default()
        }
        .with_audit("status_looked_up"))
    }
}

/// Full data context: every invoice column plus the vendor profile, so
/// the drafter never has to guess at facts.
fn format_invoice_context(invoice: &Invoice, vendor: &Vendor) -> String {
    format!(
        "--- INVOICE DETAILS ---\n\
         Invoice ID: {}\n\
         Amount: {} {}\n\
         Status: {}\n\
         Due Date: {}\n\
         Invoice Date (Issue): {}\n\n\
         --- VENDOR PROFILE (Source: Ledger) ---\n\
         Vendor ID: {}\n\
         Company: {}\n\
         Contact Name: {}\n\
         Email: {}\n\
         Phone: {}\n\
         Address: {}\n\
         Role/Category: {}",
        invoice.invoice_number,
        invoice.amount,
        invoice.currency,
        invoice.status,
        display_date(invoice.due_date),
        display_date(invoice.issue_date),
        vendor.vendor_code,
        vendor.name,
        vendor.contact_name.as_deref().unwrap_or("N/A"),
        vendor.email,
        vendor.phone.as_deref().unwrap_or("N/A"),
        vendor.address.as_deref().unwrap_or("N/A"),
        vendor.category,
    )
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Scan text for an `INV-…` invoice number.
pub(crate) fn extract_invoice_number(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(INV-[A-Za-z0-9-]+)").expect("static invoice pattern")
    });
    pattern
        .captures(text)
        .map(|caps| caps[1].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn invoice_pattern_matches_case_insensitively() {
        assert_eq!(
            extract_invoice_number("status of inv-2024-001 please"),
            Some("INV-2024-001".to_string())
        );
        assert_eq!(extract_invoice_number("no number here"), None);
    }

    #[test]
    fn invoice_pattern_takes_first_match() {
        assert_eq!(
            extract_invoice_number("INV-1 and INV-2"),
            Some("INV-1".to_string())
        );
    }

    #[test]
    fn invoice_context_includes_invoice_and_vendor_fields() {
        let invoice = Invoice {
            id: 1,
            vendor_id: 1,
            invoice_number: "INV-100".into(),
            amount: dec!(1200.50),
            currency: "USD".into(),
            status: "Pending".into(),
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 5),
        };
        let vendor = Vendor {
            id: 1,
            vendor_code: "V7755".into(),
            name: "Acme Supplies".into(),
            contact_name: Some("Jo Chavez".into()),
            email: "jchavez@acme.com".into(),
            phone: Some("5550001111".into()),
            address: None,
            category: "Supplier".into(),
        };

        let context = format_invoice_context(&invoice, &vendor);
        assert!(context.contains("INV-100"));
        assert!(context.contains("1200.50 USD"));
        assert!(context.contains("Pending"));
        assert!(context.contains("2026-02-05"));
        assert!(context.contains("V7755"));
        assert!(context.contains("Acme Supplies"));
        assert!(context.contains("Address: N/A"));
    }
}
