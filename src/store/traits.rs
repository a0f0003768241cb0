//! Store traits — narrow async interfaces the workflow stages depend on.
//!
//! One backend may implement several of these; stages only ever see the
//! trait they need.

use async_trait::async_trait;

use crate::domain::{Invoice, Turn, Vendor};
use crate::error::{IngestError, StoreError};

/// Vendor identity lookups.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find a vendor by contact email. `Ok(None)` means unknown sender.
    async fn find_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError>;
}

/// Conversation history persistence.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one turn to a thread.
    async fn append_turn(&self, thread_id: &str, turn: &Turn) -> Result<(), StoreError>;

    /// The `limit` most recent turns of a thread, newest-first.
    ///
    /// Callers that build prompt context re-order to oldest-first.
    async fn recent_turns(&self, thread_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError>;
}

/// Invoice ledger reads and the single permitted write.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Point lookup of one invoice, scoped to the owning vendor.
    async fn invoice_status(
        &self,
        invoice_number: &str,
        vendor_id: i64,
    ) -> Result<Option<Invoice>, StoreError>;

    /// All invoices with status `Pending` for a vendor.
    async fn pending_invoices(&self, vendor_id: i64) -> Result<Vec<Invoice>, StoreError>;

    /// Update a single vendor contact field. Returns rows affected.
    ///
    /// The field name must be one of [`ALLOWED_UPDATE_FIELDS`]; anything
    /// else is a query error (callers validate first).
    async fn update_vendor_field(
        &self,
        vendor_id: i64,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError>;

    /// Flat vendor+invoice rows for the ledger CSV re-export.
    async fn export_rows(&self) -> Result<Vec<LedgerExportRow>, StoreError>;
}

/// Re-export of the ledger to its external file representation.
///
/// Triggered after a successful vendor update; failures are logged by the
/// caller, never surfaced to the vendor.
#[async_trait]
pub trait LedgerExport: Send + Sync {
    async fn export(&self) -> Result<(), IngestError>;
}

/// Vendor contact fields a vendor may change about themselves.
pub const ALLOWED_UPDATE_FIELDS: [&str; 5] =
    ["phone", "name", "category", "address", "contact_name"];

/// One flat row of the exported ledger (vendor joined with invoice).
#[derive(Debug, Clone)]
pub struct LedgerExportRow {
    pub vendor_code: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub company: String,
    pub category: String,
    pub invoice_number: String,
    pub amount: String,
    pub status: String,
    pub due_date: String,
    pub issue_date: String,
}
