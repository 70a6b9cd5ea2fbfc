//! Typed credential storage for Keysmith.
//!
//! Turns category-tagged queries and strongly-typed values into the
//! attribute dictionaries a platform credential backend understands, and
//! translates the backend's status codes back into outcomes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use keysmith_keychain::{GenericPassword, Keychain, MemoryBackend, Query};
//!
//! let keychain = Keychain::new(Arc::new(MemoryBackend::new()));
//! let query = Query::<GenericPassword>::new().account("alice");
//!
//! keychain.store(&vec![1u8, 2], &query)?;
//! let value: Option<Vec<u8>> = keychain.retrieve(&query)?;
//! assert_eq!(value, Some(vec![1, 2]));
//! # Ok::<(), keysmith_keychain::StoreError>(())
//! ```

pub mod access;
pub mod attributes;
pub mod backend;
pub mod category;
pub mod convert;
pub mod error;
pub mod query;
pub mod status;
pub mod store;

pub use access::build_policy;
pub use attributes::{
    AttributeKey, AttributeMap, AttributeValue, AuthContext, Handle, KeyHandle, PolicyHandle,
};
pub use backend::{Backend, CopyResult, MemoryBackend};
pub use category::{CryptoKey, GenericPassword, InternetPassword, ItemClass, SecretCategory};
pub use convert::{
    ByteConvertible, ConversionError, KeyClass, KeyConvertible, KeyType, SymmetricKey,
    SymmetricKeySize,
};
pub use error::{Result, StoreError};
pub use query::{
    build_attributes, AuthenticationType, MatchLimit, Protocol, Query, QueryOption, Synchronizable,
};
pub use status::Status;
pub use store::{Keychain, KeychainSettings, Storable};
