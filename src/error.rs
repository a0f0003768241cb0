//! Error types for vendor-assist.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage errors (identity, ledger, and history stores).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Retrieval index errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The index holds no documents at all. Distinct from a query that
    /// matches nothing.
    #[error("Retrieval index is empty")]
    EmptyIndex,

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Data ingestion / export errors (ledger CSV, knowledge files).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Store error during ingest: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
