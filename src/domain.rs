//! Domain types — the inbound payload, vendor master records, and
//! conversation turns shared across the workflow and the stores.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Inbound / outbound boundary ─────────────────────────────────────

/// An inbound email-shaped payload.
///
/// The boundary (HTTP or CLI) constructs this once; the workflow never
/// mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailInput {
    /// Unique message identifier from the email provider.
    pub id: String,
    /// Conversation identifier grouping messages into a thread.
    pub thread_id: String,
    /// Sender email address.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Final result of one workflow run, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The drafted (or rejection) reply text.
    pub reply: String,
    /// Summary of what the workflow did, from the audit trail.
    pub action_summary: String,
    /// Whether the sender passed identity verification.
    pub authorized: bool,
}

// ── Vendor master ───────────────────────────────────────────────────

/// A row in the `vendors` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    /// Internal row id.
    pub id: i64,
    /// External vendor code from the ledger (e.g. "V7755").
    pub vendor_code: String,
    /// Company name.
    pub name: String,
    /// Contact person, if known.
    pub contact_name: Option<String>,
    /// Contact email address (the identity key).
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Role/category from the ledger (e.g. "Supplier").
    pub category: String,
}

/// A row in the `invoices` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    /// Owning vendor's internal row id.
    pub vendor_id: i64,
    /// External invoice number (e.g. "INV-2024-001").
    pub invoice_number: String,
    pub amount: Decimal,
    pub currency: String,
    /// Ledger status string (e.g. "Pending", "Paid").
    pub status: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

// ── Conversation history ────────────────────────────────────────────

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The vendor.
    User,
    /// The agent.
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role string. Unknown strings map to `User` so a
    /// corrupt row degrades to context rather than an error.
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// One turn of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}
