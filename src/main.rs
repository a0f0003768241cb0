use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;

use vendor_assist::config::Config;
use vendor_assist::domain::EmailInput;
use vendor_assist::ingest::{CsvLedgerExporter, DataIngestor};
use vendor_assist::llm::{LlmConfig, create_provider};
use vendor_assist::retrieval::{KeywordIndex, RetrievalIndex};
use vendor_assist::server;
use vendor_assist::store::{
    HistoryStore, IdentityStore, LedgerExport, LedgerStore, LibSqlBackend,
};
use vendor_assist::workflow::{Orchestrator, WorkflowConfig, WorkflowDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File + stdout logging; the guard must outlive main.
    let file_appender = tracing_appender::rolling::daily("./logs", "vendor-assist.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("📧 Vendor Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Data dir: {}", config.data_dir.display());

    // ── Stores & index ──────────────────────────────────────────────
    let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let index = Arc::new(KeywordIndex::new());

    let ingestor = DataIngestor::new(
        Arc::clone(&db),
        Arc::clone(&index),
        config.data_dir.clone(),
    );
    ingestor.ingest_all().await;
    eprintln!("   Knowledge chunks: {}", index.len());

    // ── LLM ─────────────────────────────────────────────────────────
    let llm = create_provider(&LlmConfig {
        backend: config.llm_backend,
        api_key: config.api_key.clone(),
        model: config.model.clone(),
    })?;

    // ── Workflow ────────────────────────────────────────────────────
    let ledger_export: Arc<dyn LedgerExport> = Arc::new(CsvLedgerExporter::new(
        Arc::clone(&db) as Arc<dyn LedgerStore>,
        &config.data_dir,
    ));

    let deps = WorkflowDeps {
        identity: Arc::clone(&db) as Arc<dyn IdentityStore>,
        history: Arc::clone(&db) as Arc<dyn HistoryStore>,
        ledger: Arc::clone(&db) as Arc<dyn LedgerStore>,
        ledger_export,
        index: Arc::clone(&index) as Arc<dyn RetrievalIndex>,
        llm,
    };
    let workflow_config = WorkflowConfig {
        history_limit: config.history_limit,
        retrieval_k: config.retrieval_k,
        min_phone_digits: config.min_phone_digits,
    };
    let orchestrator = Arc::new(Orchestrator::new(workflow_config, deps));

    // ── Run ─────────────────────────────────────────────────────────
    if std::env::args().any(|arg| arg == "--simulate") {
        return simulate(&orchestrator).await;
    }

    let app = server::routes(Arc::clone(&orchestrator));
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("   Listening on http://{addr} (POST /inbound)\n");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run one canned email through the workflow and print the result.
async fn simulate(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let email = EmailInput {
        id: "msg_demo_01".to_string(),
        thread_id: "thread_demo_01".to_string(),
        sender: std::env::var("VENDOR_ASSIST_SIMULATE_SENDER")
            .unwrap_or_else(|_| "jchavez@acme.com".to_string()),
        subject: "Invoice Inquiry".to_string(),
        body: std::env::var("VENDOR_ASSIST_SIMULATE_BODY")
            .unwrap_or_else(|_| "Hi, what is the status of INV-100?".to_string()),
    };

    let state = orchestrator.run(email).await;

    println!("{}", "=".repeat(50));
    println!("INTENT: {}", state.intent.map(|i| i.as_str()).unwrap_or("-"));
    println!("AUDIT:  {}", state.audit_trail.join(" > "));
    println!("{}", "-".repeat(50));
    println!("{}", state.reply);
    println!("{}", "=".repeat(50));

    Ok(())
}
