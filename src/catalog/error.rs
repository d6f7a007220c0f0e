use thiserror::Error;

/// Request-terminal failures of catalog operations.
///
/// `Internal` carries the underlying cause for logging only; it is never shown
/// to clients.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CatalogError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CatalogError::NotFound(msg.into())
    }
}
