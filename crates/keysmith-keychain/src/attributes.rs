//! Typed model of the backend's attribute dictionary.
//!
//! Credential backends speak an untyped `key -> value` dictionary. Here the
//! keys are [`AttributeKey`]s (the backend's own short names, such as `acct`
//! or `m_Limit`) and the values are a closed [`AttributeValue`] variant set.
//! [`AttributeMap`] keeps plain mapping semantics: inserting an existing key
//! replaces the old value.

use std::any::Any;
use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use keysmith_core::SecretBytes;

/// Name of a backend attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey(Cow<'static, str>);

macro_rules! attribute_keys {
    ($($(#[$meta:meta])* $name:ident = $value:literal;)*) => {
        impl AttributeKey {
            $(
                $(#[$meta])*
                pub const $name: AttributeKey = AttributeKey(Cow::Borrowed($value));
            )*
        }

        const KNOWN_KEYS: &[&str] = &[$($value),*];
    };
}

attribute_keys! {
    /// Item class discriminator.
    CLASS = "class";
    LABEL = "labl";
    DESCRIPTION = "desc";
    COMMENT = "icmt";
    ACCOUNT = "acct";
    SERVICE = "svce";
    GENERIC = "gena";
    SERVER = "srvr";
    PORT = "port";
    PROTOCOL = "ptcl";
    AUTHENTICATION_TYPE = "atyp";
    PATH = "path";
    SECURITY_DOMAIN = "sdmn";
    SYNCHRONIZABLE = "sync";
    ACCESS_GROUP = "agrp";
    /// Protection class of the item.
    ACCESSIBLE = "pdmn";
    /// Access-control policy handle; writes only.
    ACCESS_CONTROL = "accc";
    CREATION_DATE = "cdat";
    MODIFICATION_DATE = "mdat";
    KEY_CLASS = "kcls";
    KEY_TYPE = "type";
    KEY_SIZE_IN_BITS = "bsiz";
    APPLICATION_TAG = "atag";
    APPLICATION_LABEL = "klbl";
    /// Secret bytes; writes only.
    VALUE_DATA = "v_Data";
    /// Native key handle; writes only.
    VALUE_REF = "v_Ref";
    MATCH_LIMIT = "m_Limit";
    RETURN_DATA = "r_Data";
    RETURN_REF = "r_Ref";
    RETURN_ATTRIBUTES = "r_Attributes";
    AUTHENTICATION_CONTEXT = "u_AuthCtx";
    AUTHENTICATION_UI = "u_AuthUI";
}

impl AttributeKey {
    /// A key outside the built-in vocabulary. Passed through untouched.
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key belongs to the built-in vocabulary.
    pub fn is_known(&self) -> bool {
        KNOWN_KEYS.contains(&self.as_str())
    }

    /// Read-control and write-payload keys never describe a stored item.
    pub fn is_control(&self) -> bool {
        let name = self.as_str();
        name.starts_with("m_")
            || name.starts_with("r_")
            || name.starts_with("u_")
            || name.starts_with("v_")
            || *self == Self::ACCESS_CONTROL
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend constants used as attribute values.
pub mod values {
    pub const CLASS_GENERIC_PASSWORD: &str = "genp";
    pub const CLASS_INTERNET_PASSWORD: &str = "inet";
    pub const CLASS_KEY: &str = "keys";

    pub const MATCH_LIMIT_ONE: &str = "m_LimitOne";
    pub const MATCH_LIMIT_ALL: &str = "m_LimitAll";

    /// Fail instead of prompting when authentication is needed.
    pub const AUTHENTICATION_UI_FAIL: &str = "u_AuthUIF";

    /// Match synchronizable and non-synchronizable items alike.
    pub const SYNCHRONIZABLE_ANY: &str = "syna";
}

/// Type-erased backend object.
///
/// Only the backend that created the object knows its concrete type and
/// recovers it with a checked [`Opaque::downcast_ref`].
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).downcast_ref::<T>()
    }

    /// Identity comparison: two handles are equal only if they share the object.
    pub fn same(&self, other: &Opaque) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(Opaque);

        impl $name {
            pub fn new<T: Any + Send + Sync>(value: T) -> Self {
                Self(Opaque::new(value))
            }

            pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
                self.0.downcast_ref::<T>()
            }
        }
    };
}

opaque_handle!(
    /// Backend access-control object built from an access policy.
    PolicyHandle
);
opaque_handle!(
    /// Backend-native key object.
    KeyHandle
);
opaque_handle!(
    /// An authentication context the caller already satisfied out of band.
    AuthContext
);

/// The opaque-handle attribute variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    Policy(PolicyHandle),
    Key(KeyHandle),
    AuthContext(AuthContext),
}

/// Value of a backend attribute.
#[derive(Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Bool(bool),
    Bytes(SecretBytes),
    Date(DateTime<Utc>),
    Handle(Handle),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&SecretBytes> {
        match self {
            AttributeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            AttributeValue::Handle(h) => Some(h),
            _ => None,
        }
    }
}

// Byte values may be secret material, so only their length is printed.
impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s:?}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            AttributeValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            AttributeValue::Handle(h) => write!(f, "{h:?}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(v: Vec<u8>) -> Self {
        AttributeValue::Bytes(SecretBytes::new(v))
    }
}

impl From<SecretBytes> for AttributeValue {
    fn from(v: SecretBytes) -> Self {
        AttributeValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::Date(v)
    }
}

impl From<Handle> for AttributeValue {
    fn from(v: Handle) -> Self {
        AttributeValue::Handle(v)
    }
}

/// A backend request or item description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: BTreeMap<AttributeKey, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any previous value for `key`.
    pub fn insert(
        &mut self,
        key: AttributeKey,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.entries.insert(key, value.into())
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &AttributeKey) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    pub fn get_bool(&self, key: &AttributeKey) -> Option<bool> {
        self.get(key).and_then(AttributeValue::as_bool)
    }

    pub fn remove(&mut self, key: &AttributeKey) -> Option<AttributeValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &AttributeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AttributeKey, AttributeValue> {
        self.entries.iter()
    }

    /// The item class discriminator, if set.
    pub fn class(&self) -> Option<&str> {
        self.get_str(&AttributeKey::CLASS)
    }

    /// Drop read-control and payload keys, keeping only item attributes.
    pub fn without_controls(&self) -> AttributeMap {
        self.iter()
            .filter(|(k, _)| !k.is_control())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl FromIterator<(AttributeKey, AttributeValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (AttributeKey, AttributeValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(AttributeKey, AttributeValue)> for AttributeMap {
    fn extend<I: IntoIterator<Item = (AttributeKey, AttributeValue)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for AttributeMap {
    type Item = (AttributeKey, AttributeValue);
    type IntoIter = btree_map::IntoIter<AttributeKey, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a AttributeKey, &'a AttributeValue);
    type IntoIter = btree_map::Iter<'a, AttributeKey, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
