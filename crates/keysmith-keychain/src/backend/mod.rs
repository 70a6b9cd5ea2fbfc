//! The credential backend seam.
//!
//! A backend owns storage, access-control evaluation and native key objects.
//! This crate only speaks to it through attribute maps and the handful of
//! verbs below, so any key-value credential service can sit behind it.

mod memory;

pub use memory::{MemoryBackend, Request, Verb};

use keysmith_core::{AccessPolicy, SecretBytes};

use crate::attributes::{AttributeMap, KeyHandle, PolicyHandle};
use crate::status::Status;

/// What a `copy_matching` call produced, depending on the return flags it
/// was given.
#[derive(Debug, Clone, PartialEq)]
pub enum CopyResult {
    /// Secret bytes of a single item (`r_Data`).
    Data(SecretBytes),
    /// Native key object of a single item (`r_Ref`).
    Key(KeyHandle),
    /// Attributes of a single item (`r_Attributes`).
    Attributes(AttributeMap),
    /// Attributes of every matching item (`r_Attributes` with a limit above one).
    Items(Vec<AttributeMap>),
}

/// An attribute-dictionary credential service.
///
/// Every call is synchronous and stands alone; ordering between concurrent
/// calls is whatever the implementation guarantees.
pub trait Backend: Send + Sync {
    /// Add one item. `ITEM_NOT_FOUND` is never returned; `DUPLICATE_ITEM`
    /// when an item with the same primary key exists.
    fn add(&self, attributes: &AttributeMap) -> Result<(), Status>;

    /// Look up items matching `query`.
    fn copy_matching(&self, query: &AttributeMap) -> Result<CopyResult, Status>;

    /// Delete every item matching `query`.
    fn delete(&self, query: &AttributeMap) -> Result<(), Status>;

    /// Apply `changes` to every item matching `query`.
    fn update(&self, query: &AttributeMap, changes: &AttributeMap) -> Result<(), Status>;

    /// Build an access-control object for `policy`.
    fn create_access_control(&self, policy: &AccessPolicy) -> Result<PolicyHandle, Status>;

    /// Build a native key from its external representation. `attributes`
    /// carries the key class, type and size.
    fn create_key(
        &self,
        representation: &[u8],
        attributes: &AttributeMap,
    ) -> Result<KeyHandle, Status>;

    /// Export a native key's external representation, if the key allows it.
    fn export_key(&self, key: &KeyHandle) -> Option<SecretBytes>;

    /// The backend's own description of `status`.
    fn describe_status(&self, _status: Status) -> Option<String> {
        None
    }
}
