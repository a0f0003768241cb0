//! Configuration — read once from the environment at startup.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Agent configuration. Built from `VENDOR_ASSIST_*` environment variables
/// with sensible defaults for everything except the API key.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM backend to use.
    pub llm_backend: LlmBackend,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Provider API key.
    pub api_key: SecretString,
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Directory holding ledger.csv / library.csv / policy.txt.
    pub data_dir: PathBuf,
    /// How many prior turns LoadContext pulls into the prompt window.
    pub history_limit: usize,
    /// How many chunks a knowledge-retrieval query returns.
    pub retrieval_k: usize,
    /// Minimum digit count for a normalized phone number.
    pub min_phone_digits: usize,
    /// HTTP port for the inbound boundary.
    pub http_port: u16,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `VENDOR_ASSIST_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("VENDOR_ASSIST_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("VENDOR_ASSIST_API_KEY".to_string()))?;

        let llm_backend = match env_or("VENDOR_ASSIST_LLM_BACKEND", "anthropic").as_str() {
            "anthropic" => LlmBackend::Anthropic,
            "openai" => LlmBackend::OpenAi,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "VENDOR_ASSIST_LLM_BACKEND".to_string(),
                    message: format!("unknown backend '{other}' (expected anthropic|openai)"),
                });
            }
        };

        let model = env_or("VENDOR_ASSIST_MODEL", "claude-sonnet-4-20250514");

        Ok(Self {
            llm_backend,
            model,
            api_key: SecretString::from(api_key),
            db_path: PathBuf::from(env_or("VENDOR_ASSIST_DB_PATH", "./data/vendor-assist.db")),
            data_dir: PathBuf::from(env_or("VENDOR_ASSIST_DATA_DIR", "./data/raw")),
            history_limit: parse_env("VENDOR_ASSIST_HISTORY_LIMIT", 5)?,
            retrieval_k: parse_env("VENDOR_ASSIST_RETRIEVAL_K", 3)?,
            min_phone_digits: parse_env("VENDOR_ASSIST_MIN_PHONE_DIGITS", 10)?,
            http_port: parse_env("VENDOR_ASSIST_HTTP_PORT", 8080)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
