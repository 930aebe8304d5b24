//! Error types for outflow engine operations.

use outflow_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the ledger, scheduler, and dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record (`"user"`, `"campaign"`, ...).
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Malformed input or an unsatisfiable request (no eligible
    /// recipients, missing connected account, revoked account).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The campaign is not schedulable from its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The debit would take the balance negative. No entry is written.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance in credits.
        balance: i64,
        /// Required amount in credits.
        required: i64,
    },

    /// The external mail provider failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Convenience constructor for [`EngineError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}

/// Error returned by an external mail-provider call.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.0)
    }
}
