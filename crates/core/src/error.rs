//! Error taxonomy shared by every coursetrack service.

/// Result alias for service-level operations.
pub type Result<T> = std::result::Result<T, LearnError>;

/// Errors surfaced to callers of the progress and assessment services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LearnError {
    /// Input rejected before any state changed (empty submission, score out
    /// of range, malformed id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced lesson, module, assignment, submission or user does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"lesson"`
        kind: &'static str,
        /// The identifier that failed to resolve
        id: String,
    },

    /// The caller is not enrolled in (or responsible for) the course involved.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The store failed to complete an operation; nothing was applied.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl LearnError {
    /// Shorthand for a [`LearnError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for errors that come from the caller's input or permissions,
    /// as opposed to the store.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, LearnError::Persistence(_))
    }
}
