use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An argument failed validation. Nothing was changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reducer or subscriber panicked while the action was processed.
    #[error("action `{action}` panicked during processing")]
    ActionPanicked { action: String },

    /// The completion channel was dropped before the action finished.
    #[error("action was abandoned before completion")]
    Abandoned,
}

impl StoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
