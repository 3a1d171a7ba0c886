//! Error taxonomy for the dubbing pipeline.
//!
//! Mirrors spec §7: a small set of error *kinds* whose propagation behavior
//! (retry, fallback, stage-local recovery, or abort) is decided by the
//! orchestrator's stage policy table rather than by the error type itself.

use thiserror::Error;

/// Narrows a `ProviderTransient` down to the backoff schedule it should
/// use. Rate limits and 5xx responses recover on different timescales
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    RateLimited,
    ServerError,
    Network,
    Timeout,
}

/// Top-level error surfaced by a stage or the orchestrator.
#[derive(Debug, Error)]
pub enum DubError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider transient error ({provider}): {message}")]
    ProviderTransient { provider: String, message: String },

    #[error("provider transient error ({provider}, {kind:?}): {message}")]
    ProviderTransientKind {
        provider: String,
        kind: TransientKind,
        message: String,
    },

    #[error("provider permanent error ({provider}): {message}")]
    ProviderPermanent { provider: String, message: String },

    #[error("expected asset missing: {0}")]
    AssetMissing(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DubError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DubError::ProviderTransient { .. } | DubError::ProviderTransientKind { .. }
        )
    }

    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            DubError::ProviderTransientKind { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn stage_failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        DubError::StageFailed {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type DubResult<T> = Result<T, DubError>;
