//! Backend status codes and their translation into outcomes.
//!
//! Backends report failures as signed status codes. Two codes are outcomes
//! rather than failures: "item not found" becomes `None`/`false`, and
//! "duplicate item" becomes [`StoreError::DuplicateItem`] on writes. Every
//! other code becomes a typed error carrying the backend's own description of
//! the code, or `OSStatus <code>` when the backend has none.

use std::fmt;

use crate::backend::Backend;
use crate::error::StoreError;

/// A backend result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const UNIMPLEMENTED: Status = Status(-4);
    pub const PARAM: Status = Status(-50);
    pub const ALLOCATE: Status = Status(-108);
    pub const USER_CANCELED: Status = Status(-128);
    pub const NOT_AVAILABLE: Status = Status(-25291);
    pub const AUTH_FAILED: Status = Status(-25293);
    pub const DUPLICATE_ITEM: Status = Status(-25299);
    pub const ITEM_NOT_FOUND: Status = Status(-25300);
    pub const INTERACTION_NOT_ALLOWED: Status = Status(-25308);
    pub const DECODE: Status = Status(-26275);
    pub const MISSING_ENTITLEMENT: Status = Status(-34018);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        *self == Status::SUCCESS
    }

    pub fn is_not_found(&self) -> bool {
        *self == Status::ITEM_NOT_FOUND
    }

    pub fn is_duplicate(&self) -> bool {
        *self == Status::DUPLICATE_ITEM
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OSStatus {}", self.0)
    }
}

/// Human-readable description of `status`, preferring the backend's own.
pub fn describe<B: Backend + ?Sized>(backend: &B, status: Status) -> String {
    backend
        .describe_status(status)
        .unwrap_or_else(|| status.to_string())
}

/// Translate a failed `add`.
pub fn write_error<B: Backend + ?Sized>(backend: &B, status: Status) -> StoreError {
    if status.is_duplicate() {
        StoreError::DuplicateItem
    } else {
        StoreError::FailedToWriteItem {
            status,
            message: describe(backend, status),
        }
    }
}

/// Translate a read: not-found is an empty result, anything else an error.
pub fn read_outcome<B: Backend + ?Sized, T>(
    backend: &B,
    result: Result<T, Status>,
) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(status) if status.is_not_found() => Ok(None),
        Err(status) => Err(StoreError::FailedToReadItem {
            status,
            message: describe(backend, status),
        }),
    }
}

/// Translate a delete: `true` if something was removed, `false` if nothing matched.
pub fn remove_outcome<B: Backend + ?Sized>(
    backend: &B,
    result: Result<(), Status>,
) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(status) if status.is_not_found() => Ok(false),
        Err(status) => Err(StoreError::FailedToRemoveItem {
            status,
            message: describe(backend, status),
        }),
    }
}

/// Translate an update: `true` if an item was changed, `false` if nothing matched.
pub fn update_outcome<B: Backend + ?Sized>(
    backend: &B,
    result: Result<(), Status>,
) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(status) if status.is_not_found() => Ok(false),
        Err(status) => Err(write_error(backend, status)),
    }
}
