/// Errors that can occur while persisting the rule list.
///
/// Read failures never reach callers of [`crate::RuleStore::read`]; they
/// collapse to an empty list there. Write failures do surface, and every
/// caller in the engine tolerates them (the mutation actor drops the intent,
/// the evaluator keeps its in-memory disarm).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying filesystem error.
    #[error("rule store: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The rule list could not be encoded.
    #[error("rule store: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
