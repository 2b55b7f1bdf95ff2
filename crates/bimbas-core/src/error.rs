use thiserror::Error;

/// Error taxonomy shared by every component of the crate.
///
/// Mirrors the `RabbitErrors` hierarchy: each variant names a caller policy,
/// not just a failure mode. `Orchestrator` pattern-matches on this enum to
/// decide whether to absorb, retry, or propagate-and-terminate.
#[derive(Error, Debug)]
pub enum BimbasError {
    /// The login does not exist upstream. Absorbed by the Orchestrator into
    /// an `Invalid` result.
    #[error("contributor not found: {0}")]
    NotFound(String),

    /// Upstream quota exhausted. `reset` is `None` when the reset instant is
    /// unknown (unauthenticated throttling without a usable header).
    #[error("API rate limit exceeded{}", reset.map(|r| format!(", reset at {r}")).unwrap_or_default())]
    RateLimitExceeded {
        reset: Option<chrono::DateTime<chrono::Utc>>,
    },

    /// Transient failure (timeouts, 5xx, unauthenticated throttling without
    /// rate-limit headers). Retried by `RetryPolicy`; re-raised verbatim
    /// after the last attempt.
    #[error("retryable error: {0}")]
    Retryable(String),

    /// Unexpected HTTP status the state machine has no dedicated handling
    /// for. Never retried.
    #[error("API request failed with status {status}: {reason}")]
    ApiRequest { status: u16, reason: String },

    /// A row mixes activities for more than one contributor. Programmer
    /// error in the caller assembling the activity list.
    #[error("expected activities for a single contributor, found {0}")]
    MultipleContributors(usize),

    /// A config value violates a documented bound (e.g. `min_events > 300`).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The classifier could not be loaded or failed during inference.
    #[error("classifier error: {0}")]
    Model(String),

    /// Generic envelope for anything else — the `RabbitErrors` root. Holds
    /// whatever `reqwest`/`serde_json` raised, or a wrapped unexpected
    /// failure from within a single contributor's processing.
    #[error("a critical error occurred: {0}")]
    Other(String),
}

impl From<reqwest::Error> for BimbasError {
    fn from(err: reqwest::Error) -> Self {
        BimbasError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for BimbasError {
    fn from(err: serde_json::Error) -> Self {
        BimbasError::Other(err.to_string())
    }
}

impl BimbasError {
    /// Whether `RetryPolicy` should attempt this error again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BimbasError::Retryable(_))
    }
}
