//! Crate-wide error types, one per component boundary plus a root error that
//! unifies them for callers that don't care which subsystem failed. Mirrors
//! the teacher's `NodeError`/`ConfigError` split: `thiserror` for the
//! `Display`/`source` chain, `miette::Diagnostic` (behind the `diagnostics`
//! feature) for rich CLI rendering of configuration failures.

use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Fatal at startup; the CLI entry point maps this to exit code 2.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config ({format}): {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),

    #[error("required provider '{provider}' is not configured: {reason}")]
    ProviderUnconfigured { provider: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum WikiSourceError {
    #[error("transient wiki error: {0}")]
    Transient(String),
    #[error("permanent wiki error for page {page_id}: {reason}")]
    Permanent { page_id: String, reason: String },
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("stale store connection: {0}")]
    Connection(String),
    #[error("store operation failed: {0}")]
    Operation(String),
    #[error("chunk not found: {0}")]
    NotFound(String),
}

impl GraphStoreError {
    /// Pure classifier required by §4.4 / §9 — exposed so it is unit
    /// testable independent of any live connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, GraphStoreError::Connection(_))
    }
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("transient failure ingesting page {page_id}: {source}")]
    Transient {
        page_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("permanent failure ingesting page {page_id}: {reason}")]
    Permanent { page_id: String, reason: String },
    #[error("embedder error: {0}")]
    Embedder(String),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error("circuit breaker open for {operation}")]
    BreakerOpen { operation: &'static str },
}

#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error("embedder unavailable: {0}")]
    Embedder(String),
}

#[derive(Debug, Error)]
pub enum QualityError {
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error("analytics store error: {0}")]
    Analytics(String),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error("archive export failed for {chunk_id}: {source}")]
    ArchiveExport {
        chunk_id: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Retriever(#[from] RetrieverError),
    #[error("llm generation failed: {0}")]
    Generation(String),
    #[error("chat surface error: {0}")]
    ChatSurface(String),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error(transparent)]
    Analytics(#[from] QualityError),
}

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("chat surface error: {0}")]
    ChatSurface(String),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error(transparent)]
    Analytics(#[from] QualityError),
}

/// Root error for callers that bridge multiple components (the CLI, tests).
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Wiki(#[from] WikiSourceError),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Retriever(#[from] RetrieverError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Escalation(#[from] EscalationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_classifier_is_pure() {
        let err = GraphStoreError::Connection("broken pipe".into());
        assert!(err.is_connection_error());
        let err = GraphStoreError::Operation("bad query".into());
        assert!(!err.is_connection_error());
    }
}
