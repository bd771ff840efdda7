// src/infra/errors.rs — Error types for KitForge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KitForgeError {
    // Request errors (never retried)
    #[error("Invalid request: {0}")]
    Validation(String),

    // External service errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Stage '{stage}' timed out after {after_ms}ms")]
    Timeout { stage: String, after_ms: u64 },

    // Configuration (fatal for the whole request)
    #[error("Missing required credential: {name}")]
    MissingCredential { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KitForgeError {
    /// Transient failures worth another attempt. Rate limits are deliberately
    /// excluded: a 429 routes straight to the deterministic fallback instead
    /// of burning the remaining stage window on retries.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            KitForgeError::Provider {
                retriable: true,
                ..
            } | KitForgeError::Timeout { .. }
        )
    }

    /// Errors that fail the whole build rather than a single need.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KitForgeError::MissingCredential { .. } | KitForgeError::Config(_)
        )
    }

    pub fn timeout(stage: &str, after_ms: u64) -> Self {
        KitForgeError::Timeout {
            stage: stage.to_string(),
            after_ms,
        }
    }
}
