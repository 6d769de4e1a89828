use mg_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// Recoverable, user-visible condition: a selection precondition was
    /// not met (nothing selected, or invalid targets only). The operation
    /// was a no-op and nothing reached the history.
    #[error("{0}")]
    Advisory(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EditorError {
    pub fn advisory(msg: impl Into<String>) -> Self {
        EditorError::Advisory(msg.into())
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self, EditorError::Advisory(_))
    }
}
