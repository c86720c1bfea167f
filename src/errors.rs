//! # Error Types Module
//!
//! Error types shared by the ordering core. Store failures are kept apart from
//! conversation errors so the engine can decide whether a step may be retried.

use thiserror::Error;

/// Failures of the persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while driving a conversation or handling operator input
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Session is missing context for step {0}")]
    MissingContext(String),

    #[error("Item {0} is out of stock")]
    OutOfStock(String),

    #[error("Collection {0} has no items")]
    EmptyCollection(String),

    #[error("Invalid operator input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ShopError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ShopError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Localization key of the warning shown to the customer
    pub fn warning_key(&self) -> &'static str {
        match self {
            ShopError::NotFound { .. } | ShopError::MissingContext(_) => "warn-not-found",
            ShopError::OutOfStock(_) => "warn-item-unavailable",
            ShopError::EmptyCollection(_) => "warn-collection-empty",
            ShopError::InvalidInput(_) => "supply-invalid",
            ShopError::Config(_) | ShopError::Store(_) => "warn-service-unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
