/// Errors that can occur while delivering a notification.
///
/// The engine treats delivery as fire-and-forget: these errors are logged at
/// the call site and never abort an evaluation cycle.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// An HTTP request to the gateway failed at the transport level.
    #[error("notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("notify: gateway error: status={status}, body={body}")]
    Gateway { status: u16, body: String },

    /// Generic delivery error for cases not covered by other variants.
    #[error("notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
