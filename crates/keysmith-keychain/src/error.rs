//! Error types for keychain operations.
//!
//! "Item not found" is never an error here: reads return `None` and removes
//! return `false`.

use thiserror::Error;

use crate::convert::ConversionError;
use crate::status::Status;

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Stored bytes could not be parsed back into the requested value.
    #[error("Invalid representation: {0}")]
    InvalidRepresentation(String),

    /// The backend could not build a native key from the external
    /// representation, or could not export one back out.
    #[error("Missing key representation: {0}")]
    MissingKeyRepresentation(String),

    /// Exported key bytes did not parse into the requested key type.
    #[error("Failed key conversion: {0}")]
    FailedKeyConversion(String),

    /// An item matching the write already exists.
    #[error("Duplicate item")]
    DuplicateItem,

    #[error("Failed to write item: {message}")]
    FailedToWriteItem { status: Status, message: String },

    #[error("Failed to read item: {message}")]
    FailedToReadItem { status: Status, message: String },

    #[error("Failed to remove item: {message}")]
    FailedToRemoveItem { status: Status, message: String },

    /// The backend refused the protection tier / capability combination.
    #[error("Access policy construction failed: {message}")]
    PolicyConstruction { status: Status, message: String },

    /// A query option is not part of the category's vocabulary.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    /// The backend status behind this error, if it came from the backend.
    pub fn status(&self) -> Option<Status> {
        match self {
            StoreError::DuplicateItem => Some(Status::DUPLICATE_ITEM),
            StoreError::FailedToWriteItem { status, .. }
            | StoreError::FailedToReadItem { status, .. }
            | StoreError::FailedToRemoveItem { status, .. }
            | StoreError::PolicyConstruction { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ConversionError> for StoreError {
    fn from(e: ConversionError) -> Self {
        StoreError::InvalidRepresentation(e.to_string())
    }
}

/// Convenience result alias for keychain operations.
pub type Result<T> = std::result::Result<T, StoreError>;
