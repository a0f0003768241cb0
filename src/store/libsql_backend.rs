//! libSQL backend — one async backend implementing every store trait.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text; invoice amounts as decimal strings.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::{Invoice, Turn, TurnRole, Vendor};
use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{
    HistoryStore, IdentityStore, LedgerExportRow, LedgerStore,
};

const VENDOR_COLUMNS: &str =
    "id, vendor_code, name, contact_name, email, phone, address, category";
const INVOICE_COLUMNS: &str =
    "id, vendor_id, invoice_number, amount, currency, status, issue_date, due_date";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert a vendor if its code is new; return the internal row id
    /// either way. Used by ledger ingestion.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_vendor(
        &self,
        vendor_code: &str,
        company: &str,
        contact_name: &str,
        email: &str,
        phone: &str,
        address: &str,
        category: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO vendors
                (vendor_code, name, contact_name, email, phone, address, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![vendor_code, company, contact_name, email, phone, address, category],
        )
        .await
        .map_err(|e| StoreError::Query(format!("upsert_vendor: {e}")))?;

        let mut rows = conn
            .query(
                "SELECT id FROM vendors WHERE vendor_code = ?1",
                params![vendor_code],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert_vendor id lookup: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| StoreError::Query(format!("upsert_vendor id parse: {e}"))),
            Ok(None) => Err(StoreError::Query(format!(
                "vendor {vendor_code} missing after upsert"
            ))),
            Err(e) => Err(StoreError::Query(format!("upsert_vendor id lookup: {e}"))),
        }
    }

    /// Insert an invoice if (vendor, number) is new. Used by ingestion.
    pub async fn upsert_invoice(
        &self,
        vendor_id: i64,
        invoice_number: &str,
        amount: &str,
        status: &str,
        issue_date: &str,
        due_date: &str,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO invoices
                    (vendor_id, invoice_number, amount, status, issue_date, due_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![vendor_id, invoice_number, amount, status, issue_date, due_date],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert_invoice: {e}")))?;
        Ok(())
    }
}

// ── Row mappers ─────────────────────────────────────────────────────

fn row_to_vendor(row: &libsql::Row) -> Result<Vendor, libsql::Error> {
    Ok(Vendor {
        id: row.get(0)?,
        vendor_code: row.get(1)?,
        name: row.get(2)?,
        contact_name: row.get::<String>(3).ok().filter(|s| !s.is_empty()),
        email: row.get(4)?,
        phone: row.get::<String>(5).ok().filter(|s| !s.is_empty()),
        address: row.get::<String>(6).ok().filter(|s| !s.is_empty()),
        category: row.get(7)?,
    })
}

fn row_to_invoice(row: &libsql::Row) -> Result<Invoice, libsql::Error> {
    let amount_str: String = row.get(3)?;
    Ok(Invoice {
        id: row.get(0)?,
        vendor_id: row.get(1)?,
        invoice_number: row.get(2)?,
        amount: Decimal::from_str(&amount_str).unwrap_or(Decimal::ZERO),
        currency: row.get(4)?,
        status: row.get(5)?,
        issue_date: parse_date(row.get::<String>(6).ok()),
        due_date: parse_date(row.get::<String>(7).ok()),
    })
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl IdentityStore for LibSqlBackend {
    async fn find_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE email = ?1 LIMIT 1"),
                params![email],
            )
            .await
            .map_err(|e| StoreError::Query(format!("find_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let vendor = row_to_vendor(&row)
                    .map_err(|e| StoreError::Query(format!("find_by_email row parse: {e}")))?;
                Ok(Some(vendor))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find_by_email: {e}"))),
        }
    }
}

#[async_trait]
impl HistoryStore for LibSqlBackend {
    async fn append_turn(&self, thread_id: &str, turn: &Turn) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO conversation_history (thread_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    thread_id,
                    turn.role.as_str(),
                    turn.content.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("append_turn: {e}")))?;
        debug!(thread_id, role = turn.role.as_str(), "Turn appended");
        Ok(())
    }

    async fn recent_turns(&self, thread_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT role, content FROM conversation_history
                 WHERE thread_id = ?1 ORDER BY id DESC LIMIT ?2",
                params![thread_id, limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("recent_turns: {e}")))?;

        let mut turns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let role: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("recent_turns row parse: {e}")))?;
            let content: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("recent_turns row parse: {e}")))?;
            turns.push(Turn {
                role: TurnRole::parse(&role),
                content,
            });
        }
        Ok(turns)
    }
}

#[async_trait]
impl LedgerStore for LibSqlBackend {
    async fn invoice_status(
        &self,
        invoice_number: &str,
        vendor_id: i64,
    ) -> Result<Option<Invoice>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoices
                     WHERE invoice_number = ?1 AND vendor_id = ?2"
                ),
                params![invoice_number, vendor_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("invoice_status: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let invoice = row_to_invoice(&row)
                    .map_err(|e| StoreError::Query(format!("invoice_status row parse: {e}")))?;
                Ok(Some(invoice))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("invoice_status: {e}"))),
        }
    }

    async fn pending_invoices(&self, vendor_id: i64) -> Result<Vec<Invoice>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoices
                     WHERE vendor_id = ?1 AND status = 'Pending'
                     ORDER BY invoice_number"
                ),
                params![vendor_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("pending_invoices: {e}")))?;

        let mut invoices = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let invoice = row_to_invoice(&row)
                .map_err(|e| StoreError::Query(format!("pending_invoices row parse: {e}")))?;
            invoices.push(invoice);
        }
        Ok(invoices)
    }

    async fn update_vendor_field(
        &self,
        vendor_id: i64,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError> {
        // Field names are matched to fixed column names; arbitrary input
        // never reaches the SQL text.
        let column = match field {
            "phone" => "phone",
            "name" => "name",
            "category" => "category",
            "address" => "address",
            "contact_name" => "contact_name",
            other => {
                return Err(StoreError::Query(format!(
                    "update of field '{other}' is not permitted"
                )));
            }
        };

        let affected = self
            .conn()
            .execute(
                &format!(
                    "UPDATE vendors SET {column} = ?1, updated_at = datetime('now')
                     WHERE id = ?2"
                ),
                params![value, vendor_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_vendor_field: {e}")))?;

        debug!(vendor_id, field, affected, "Vendor field updated");
        Ok(affected)
    }

    async fn export_rows(&self) -> Result<Vec<LedgerExportRow>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT
                    v.vendor_code,
                    COALESCE(v.contact_name, ''),
                    v.email,
                    COALESCE(v.phone, ''),
                    COALESCE(v.address, ''),
                    v.name,
                    v.category,
                    i.invoice_number,
                    i.amount,
                    i.status,
                    COALESCE(i.due_date, ''),
                    COALESCE(i.issue_date, '')
                 FROM vendors v
                 JOIN invoices i ON v.id = i.vendor_id
                 ORDER BY v.vendor_code, i.invoice_number",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("export_rows: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let get = |i: i32| -> Result<String, StoreError> {
                row.get(i)
                    .map_err(|e| StoreError::Query(format!("export_rows row parse: {e}")))
            };
            out.push(LedgerExportRow {
                vendor_code: get(0)?,
                contact_name: get(1)?,
                email: get(2)?,
                phone: get(3)?,
                address: get(4)?,
                company: get(5)?,
                category: get(6)?,
                invoice_number: get(7)?,
                amount: get(8)?,
                status: get(9)?,
                due_date: get(10)?,
                issue_date: get(11)?,
            });
        }
        Ok(out)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
