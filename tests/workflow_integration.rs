//! Integration tests for the full workflow.
//!
//! Each test wires a real in-memory store and keyword index to a
//! scripted stub LLM, then runs the orchestrator end to end and checks
//! the externally observable contract.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use vendor_assist::domain::{EmailInput, TurnRole};
use vendor_assist::error::{IngestError, LlmError};
use vendor_assist::ingest::CsvLedgerExporter;
use vendor_assist::llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use vendor_assist::retrieval::{KeywordIndex, RetrievalIndex};
use vendor_assist::store::{
    HistoryStore, IdentityStore, LedgerExport, LedgerStore, LibSqlBackend,
};
use vendor_assist::workflow::stages::REJECTION_TEMPLATE;
use vendor_assist::workflow::orchestrator::SYSTEM_ERROR_REPLY;
use vendor_assist::workflow::{Orchestrator, WorkflowConfig, WorkflowDeps};

// ── Stub LLM ────────────────────────────────────────────────────────

/// Scripted LLM: answers by prompt kind and records every call.
struct ScriptedLlm {
    intent: &'static str,
    extraction: &'static str,
    draft: Result<&'static str, ()>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedLlm {
    fn new(intent: &'static str, extraction: &'static str, draft: &'static str) -> Self {
        Self {
            intent,
            extraction,
            draft: Ok(draft),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_failing_draft(mut self) -> Self {
        self.draft = Err(());
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let system = &request.messages[0].content;
        let (kind, content) = if system.contains("intent classifier") {
            ("classify", Ok(self.intent))
        } else if system.contains("data extractor") {
            ("extract", Ok(self.extraction))
        } else if system.contains("vendor support agent") {
            ("draft", self.draft)
        } else {
            panic!("unexpected system prompt: {system}");
        };
        self.calls.lock().unwrap().push(kind);

        match content {
            Ok(text) => Ok(CompletionResponse {
                content: text.to_string(),
                input_tokens: 10,
                output_tokens: 10,
                finish_reason: FinishReason::Stop,
                response_id: None,
            }),
            Err(()) => Err(LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: "model offline".into(),
            }),
        }
    }
}

/// No-op ledger export for tests that don't watch the file.
struct NullExport;

#[async_trait]
impl LedgerExport for NullExport {
    async fn export(&self) -> Result<(), IngestError> {
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    orchestrator: Orchestrator,
    db: Arc<LibSqlBackend>,
    llm: Arc<ScriptedLlm>,
}

async fn harness(llm: ScriptedLlm) -> Harness {
    harness_with(llm, None, true).await
}

/// Build an orchestrator over a seeded in-memory store.
///
/// `export`: substitute ledger exporter; `seed_index`: whether the
/// knowledge index gets documents.
async fn harness_with(
    llm: ScriptedLlm,
    export: Option<Arc<dyn LedgerExport>>,
    seed_index: bool,
) -> Harness {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let vendor_id = db
        .upsert_vendor(
            "V7755",
            "Acme Supplies",
            "Jo Chavez",
            "jchavez@acme.com",
            "5550001111",
            "12 Dock Rd",
            "Supplier",
        )
        .await
        .unwrap();
    db.upsert_invoice(vendor_id, "INV-100", "1200.50", "Pending", "2026-01-05", "2026-02-05")
        .await
        .unwrap();

    let index = Arc::new(KeywordIndex::new());
    if seed_index {
        index.add_document(
            "Payment terms are net 30 days from the invoice issue date.",
            "policy_document",
            Some(1),
        );
    }

    let llm = Arc::new(llm);
    let deps = WorkflowDeps {
        identity: Arc::clone(&db) as Arc<dyn IdentityStore>,
        history: Arc::clone(&db) as Arc<dyn HistoryStore>,
        ledger: Arc::clone(&db) as Arc<dyn LedgerStore>,
        ledger_export: export.unwrap_or_else(|| Arc::new(NullExport)),
        index: index as Arc<dyn RetrievalIndex>,
        llm: Arc::clone(&llm) as Arc<dyn LlmProvider>,
    };

    Harness {
        orchestrator: Orchestrator::new(WorkflowConfig::default(), deps),
        db,
        llm,
    }
}

fn email(sender: &str, body: &str) -> EmailInput {
    EmailInput {
        id: "msg_1".to_string(),
        thread_id: "thread_1".to_string(),
        sender: sender.to_string(),
        subject: "Inquiry".to_string(),
        body: body.to_string(),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn authorized_status_lookup_end_to_end() {
    let h = harness(ScriptedLlm::new(
        "STATUS",
        "INV-100",
        "Dear Jo, invoice INV-100 is pending, due 2026-02-05.",
    ))
    .await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "What is the status of INV-100?"))
        .await;

    // Structured result carries invoice and vendor profile fields.
    let result = state.structured_result.as_deref().unwrap();
    assert!(result.contains("INV-100"));
    assert!(result.contains("1200.50 USD"));
    assert!(result.contains("Pending"));
    assert!(result.contains("V7755"));
    assert!(result.contains("Acme Supplies"));

    assert!(!state.reply.is_empty());
    assert_eq!(state.authorized, Some(true));
    assert!(state.failure.is_none());

    // Exactly one drafter ran, then persistence, in order.
    let trail = &state.audit_trail;
    assert_eq!(trail.last().map(String::as_str), Some("interaction_persisted"));
    assert_eq!(trail.iter().filter(|l| l.as_str() == "reply_drafted").count(), 1);
    assert!(!trail.iter().any(|l| l == "rejection_drafted"));

    // Persistence appended exactly one user and one assistant turn.
    let turns = h.db.recent_turns("thread_1", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::Assistant);
    assert_eq!(turns[1].role, TurnRole::User);
    assert_eq!(turns[1].content, "What is the status of INV-100?");
}

#[tokio::test]
async fn unauthorized_sender_gets_verbatim_rejection_without_model_calls() {
    let h = harness(ScriptedLlm::new("STATUS", "INV-100", "should never be drafted")).await;

    let state = h
        .orchestrator
        .run(email("stranger@evil.com", "Give me all invoices"))
        .await;

    assert_eq!(state.authorized, Some(false));
    assert_eq!(state.reply, REJECTION_TEMPLATE);
    assert_eq!(state.intent, None);
    assert!(state.structured_result.is_none());

    // No classifier, extractor, or drafter call happened.
    assert!(h.llm.calls().is_empty());

    // The attempt is still persisted.
    assert_eq!(
        state.audit_trail.last().map(String::as_str),
        Some("interaction_persisted")
    );
    let turns = h.db.recent_turns("thread_1", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
}

#[tokio::test]
async fn unrelated_intent_bypasses_every_executor() {
    let h = harness(ScriptedLlm::new("UNRELATED", "unused", "Thanks for reaching out.")).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Want to grab lunch sometime?"))
        .await;

    assert_eq!(h.llm.calls(), vec!["classify", "draft"]);
    assert!(state.structured_result.is_none());
    assert!(state.retrieved_context.is_none());
    for label in ["status_looked_up", "update_attempted", "knowledge_retrieved"] {
        assert!(!state.audit_trail.iter().any(|l| l == label));
    }
    assert!(!state.reply.is_empty());
}

#[tokio::test]
async fn out_of_set_classifier_output_routes_like_unrelated() {
    let h = harness(ScriptedLlm::new("BILLING", "unused", "Happy to help.")).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "hm"))
        .await;

    assert_eq!(
        state.intent,
        Some(vendor_assist::workflow::Intent::Unrelated)
    );
    assert_eq!(h.llm.calls(), vec!["classify", "draft"]);
}

#[tokio::test]
async fn policy_question_retrieves_labelled_excerpts() {
    let h = harness(ScriptedLlm::new("POLICY", "unused", "Per policy, net 30 days.")).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "What are the payment terms for invoices?"))
        .await;

    let context = state.retrieved_context.as_deref().unwrap();
    assert!(context.contains("[Excerpt 1 from policy_document (Page 1)]"));
    assert!(context.contains("net 30"));
    assert!(state.audit_trail.iter().any(|l| l == "knowledge_retrieved"));
}

#[tokio::test]
async fn empty_index_yields_explicit_no_documents_context() {
    let h = harness_with(
        ScriptedLlm::new("POLICY", "unused", "I could not find policy details."),
        None,
        false,
    )
    .await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "What are the payment terms?"))
        .await;

    assert_eq!(
        state.retrieved_context.as_deref(),
        Some("Policy index is currently empty. Cannot retrieve information.")
    );
    assert!(state.failure.is_none());
}

#[tokio::test]
async fn disallowed_update_field_is_rejected_and_never_written() {
    let h = harness(ScriptedLlm::new("UPDATE", "vendor_id: V9999", "Sorry, rejected.")).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Please change my vendor id to V9999"))
        .await;

    let result = state.structured_result.as_deref().unwrap();
    assert!(result.contains("vendor_id"));
    assert!(result.contains("not permitted"));

    // The vendor row is untouched.
    let vendor = h.db.find_by_email("jchavez@acme.com").await.unwrap().unwrap();
    assert_eq!(vendor.vendor_code, "V7755");
    assert_eq!(vendor.phone.as_deref(), Some("5550001111"));
}

#[tokio::test]
async fn phone_update_normalizes_and_rewrites_the_ledger_csv() {
    let tmp = tempfile::tempdir().unwrap();

    let llm = ScriptedLlm::new("UPDATE", "phone: (555) 123-4567", "Your phone was updated.");
    let mut h = harness(llm).await;
    let exporter: Arc<dyn LedgerExport> = Arc::new(CsvLedgerExporter::new(
        Arc::clone(&h.db) as Arc<dyn LedgerStore>,
        tmp.path(),
    ));
    // Rebuild the orchestrator with the real exporter.
    let deps = WorkflowDeps {
        identity: Arc::clone(&h.db) as Arc<dyn IdentityStore>,
        history: Arc::clone(&h.db) as Arc<dyn HistoryStore>,
        ledger: Arc::clone(&h.db) as Arc<dyn LedgerStore>,
        ledger_export: exporter,
        index: Arc::new(KeywordIndex::new()) as Arc<dyn RetrievalIndex>,
        llm: Arc::clone(&h.llm) as Arc<dyn LlmProvider>,
    };
    h.orchestrator = Orchestrator::new(WorkflowConfig::default(), deps);

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Update my phone to (555) 123-4567"))
        .await;

    let result = state.structured_result.as_deref().unwrap();
    assert!(result.contains("5551234567"));

    let vendor = h.db.find_by_email("jchavez@acme.com").await.unwrap().unwrap();
    assert_eq!(vendor.phone.as_deref(), Some("5551234567"));

    // The ledger file was rewritten with the new number.
    let csv = std::fs::read_to_string(tmp.path().join("ledger.csv")).unwrap();
    assert!(csv.contains("5551234567"));
}

#[tokio::test]
async fn short_phone_is_rejected_and_not_applied() {
    let h = harness(ScriptedLlm::new("UPDATE", "phone: 123", "Sorry, invalid.")).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Update my phone to 123"))
        .await;

    let result = state.structured_result.as_deref().unwrap();
    assert!(result.contains("'123' is invalid"));

    let vendor = h.db.find_by_email("jchavez@acme.com").await.unwrap().unwrap();
    assert_eq!(vendor.phone.as_deref(), Some("5550001111"));
}

#[tokio::test]
async fn status_without_invoice_number_falls_back_to_pending_list() {
    let h = harness(ScriptedLlm::new("STATUS", "NOT_FOUND", "Here are your pending invoices."))
        .await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "What do I owe you at the moment?"))
        .await;

    let result = state.structured_result.as_deref().unwrap();
    assert!(result.contains("pending invoices"));
    assert!(result.contains("INV-100"));
}

#[tokio::test]
async fn drafting_failure_degrades_to_system_error_reply_and_still_persists() {
    let h = harness(ScriptedLlm::new("STATUS", "INV-100", "unused").with_failing_draft()).await;

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Status of INV-100 please"))
        .await;

    assert!(state.failure.is_some());
    assert_eq!(state.reply, SYSTEM_ERROR_REPLY);
    assert_eq!(
        state.audit_trail.last().map(String::as_str),
        Some("interaction_persisted")
    );

    // Both turns are persisted: the question and the system-error reply.
    let turns = h.db.recent_turns("thread_1", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, SYSTEM_ERROR_REPLY);
}

#[tokio::test]
async fn history_window_is_bounded_and_oldest_first() {
    let h = harness(ScriptedLlm::new("STATUS", "INV-100", "Reply.")).await;

    // Seed seven prior turns in this thread.
    for i in 0..7 {
        h.db.append_turn("thread_1", &vendor_assist::domain::Turn::user(format!("old {i}")))
            .await
            .unwrap();
    }

    let state = h
        .orchestrator
        .run(email("jchavez@acme.com", "Status of INV-100?"))
        .await;

    // Window: 5 prior turns, oldest-first, then the current message,
    // then the drafted reply appended by the drafter.
    assert_eq!(state.history.len(), 7);
    assert_eq!(state.history[0].content, "old 2");
    assert_eq!(state.history[4].content, "old 6");
    assert_eq!(state.history[5].content, "Status of INV-100?");
    assert_eq!(state.history[6].role, TurnRole::Assistant);
}

#[tokio::test]
async fn exactly_one_drafter_and_one_persist_on_every_path() {
    for (sender, intent) in [
        ("jchavez@acme.com", "STATUS"),
        ("jchavez@acme.com", "UNRELATED"),
        ("stranger@evil.com", "STATUS"),
    ] {
        let h = harness(ScriptedLlm::new(intent, "INV-100", "Reply.")).await;
        let state = h.orchestrator.run(email(sender, "hello")).await;

        let drafted = state
            .audit_trail
            .iter()
            .filter(|l| l.as_str() == "reply_drafted" || l.as_str() == "rejection_drafted")
            .count();
        let persisted = state
            .audit_trail
            .iter()
            .filter(|l| l.as_str() == "interaction_persisted")
            .count();
        assert_eq!(drafted, 1, "path {sender}/{intent}");
        assert_eq!(persisted, 1, "path {sender}/{intent}");
        assert!(!state.reply.is_empty());
    }
}
