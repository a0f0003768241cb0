//! Data ingestion and export.
//!
//! Bootstraps the store and the knowledge index from the raw data
//! directory, and rewrites the ledger CSV after vendor updates:
//! - `ledger.csv`  → vendors + invoices tables
//! - `library.csv` → email-archive chunks in the retrieval index
//! - `policy.txt`  → policy chunks in the retrieval index
//!
//! Missing files are warnings, not errors: the agent runs fine against
//! an already-populated store.

mod csv;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::retrieval::KeywordIndex;
use crate::store::{LedgerExport, LedgerStore, LibSqlBackend};

pub use csv::{Record, parse_csv, write_csv};

const LEDGER_FILE: &str = "ledger.csv";
const LIBRARY_FILE: &str = "library.csv";
const POLICY_FILE: &str = "policy.txt";

/// Loads raw data files into the store and the retrieval index.
pub struct DataIngestor {
    store: Arc<LibSqlBackend>,
    index: Arc<KeywordIndex>,
    data_dir: PathBuf,
}

impl DataIngestor {
    pub fn new(store: Arc<LibSqlBackend>, index: Arc<KeywordIndex>, data_dir: PathBuf) -> Self {
        Self {
            store,
            index,
            data_dir,
        }
    }

    /// Run the full ingestion pass. Individual file problems are logged
    /// and skipped.
    pub async fn ingest_all(&self) {
        match self.ingest_ledger().await {
            Ok(rows) => info!(rows, "Ledger data loaded"),
            Err(e) => warn!(error = %e, "Ledger ingest skipped"),
        }
        match self.ingest_library() {
            Ok(chunks) => info!(chunks, "Email archive indexed"),
            Err(e) => warn!(error = %e, "Library ingest skipped"),
        }
        match self.ingest_policy() {
            Ok(chunks) => info!(chunks, "Policy document indexed"),
            Err(e) => warn!(error = %e, "Policy ingest skipped"),
        }
    }

    /// Parse `ledger.csv` and upsert vendors and invoices.
    pub async fn ingest_ledger(&self) -> Result<usize, IngestError> {
        let records = self.read_records(LEDGER_FILE)?;
        let mut count = 0;

        for record in &records {
            let get = |key: &str| record.field(key).unwrap_or_default();

            let vendor_id = self
                .store
                .upsert_vendor(
                    &get("vendor_id"),
                    &get("company"),
                    &get("name"),
                    &get("email"),
                    &get("phone"),
                    &get("address"),
                    &get("role"),
                )
                .await?;

            self.store
                .upsert_invoice(
                    vendor_id,
                    &get("invoice_id"),
                    &get("amount"),
                    &get("status"),
                    &get("invoice_date"),
                    &get("due_date"),
                )
                .await?;
            count += 1;
        }

        Ok(count)
    }

    /// Index `library.csv` (past email archive) for retrieval.
    pub fn ingest_library(&self) -> Result<usize, IngestError> {
        let records = self.read_records(LIBRARY_FILE)?;

        for record in &records {
            let get = |key: &str| record.field(key).unwrap_or_default();
            let content = format!(
                "Subject: {}\nItem: {} ({})\nSummary: {}\nBody: {}\nReply: {}",
                get("subject"),
                get("item_name"),
                get("category"),
                get("summary"),
                get("body"),
                get("reply_text"),
            );
            self.index.add_document(&content, "email_archive", None);
        }

        Ok(records.len())
    }

    /// Index `policy.txt`, one chunk per paragraph.
    pub fn ingest_policy(&self) -> Result<usize, IngestError> {
        let path = self.data_dir.join(POLICY_FILE);
        let text = read_file(&path)?;

        let mut chunks = 0;
        for (i, paragraph) in text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .enumerate()
        {
            self.index
                .add_document(paragraph, "policy_document", Some(i as u32 + 1));
            chunks += 1;
        }

        Ok(chunks)
    }

    fn read_records(&self, file: &str) -> Result<Vec<csv::Record>, IngestError> {
        let path = self.data_dir.join(file);
        let text = read_file(&path)?;
        parse_csv(&text)
    }
}

fn read_file(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ── Ledger CSV export ───────────────────────────────────────────────

/// Headers of the exported ledger, matching the ingest format.
const LEDGER_HEADERS: [&str; 12] = [
    "vendor_id",
    "name",
    "email",
    "phone",
    "address",
    "company",
    "role",
    "invoice_id",
    "amount",
    "status",
    "due_date",
    "invoice_date",
];

/// Rewrites `ledger.csv` from current store state.
///
/// Triggered after every successful vendor update so the external file
/// stays in step with the database.
pub struct CsvLedgerExporter {
    ledger: Arc<dyn LedgerStore>,
    path: PathBuf,
}

impl CsvLedgerExporter {
    pub fn new(ledger: Arc<dyn LedgerStore>, data_dir: &Path) -> Self {
        Self {
            ledger,
            path: data_dir.join(LEDGER_FILE),
        }
    }
}

#[async_trait]
impl LedgerExport for CsvLedgerExporter {
    async fn export(&self) -> Result<(), IngestError> {
        let rows = self.ledger.export_rows().await?;
        if rows.is_empty() {
            warn!("Ledger export skipped: store is empty");
            return Ok(());
        }

        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.vendor_code.clone(),
                    r.contact_name.clone(),
                    r.email.clone(),
                    r.phone.clone(),
                    r.address.clone(),
                    r.company.clone(),
                    r.category.clone(),
                    r.invoice_number.clone(),
                    r.amount.clone(),
                    r.status.clone(),
                    r.due_date.clone(),
                    r.issue_date.clone(),
                ]
            })
            .collect();

        let text = write_csv(&LEDGER_HEADERS, &table);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::Export(e.to_string()))?;
        }
        std::fs::write(&self.path, text).map_err(|e| IngestError::Export(e.to_string()))?;

        info!(rows = rows.len(), path = %self.path.display(), "Ledger CSV rewritten");
        Ok(())
    }
}
