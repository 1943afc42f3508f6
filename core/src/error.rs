use thiserror::Error;

/// Errors raised by the query layer.
///
/// A lookup that matches nothing is not an error: those operations return
/// `Ok(None)` or an empty `Vec` and callers branch on that.
#[derive(Debug, Error)]
pub enum DexError {
    /// A statement key was requested before it was prepared. This is a
    /// construction-order bug in the calling module, never a runtime condition.
    #[error("statement not prepared: {0}")]
    StatementNotFound(&'static str),

    /// A caller-supplied criterion outside the accepted set (e.g. an unknown
    /// ranking metric).
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Anything the storage engine reports. Passed through unchanged.
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DexError>;
