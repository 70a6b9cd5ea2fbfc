//! Secret categories.
//!
//! A category fixes three things: the item-class discriminator sent with every
//! request, the attribute vocabulary a query may use, and what a retrieve asks
//! the backend to return (secret data for passwords, a key reference for keys).

use std::fmt;

use crate::attributes::{values, AttributeKey};

mod sealed {
    pub trait Sealed {}
}

/// Backend item class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemClass {
    GenericPassword,
    InternetPassword,
    Key,
}

impl ItemClass {
    /// Every class, in the order bulk operations visit them.
    pub const ALL: [ItemClass; 3] = [
        ItemClass::GenericPassword,
        ItemClass::InternetPassword,
        ItemClass::Key,
    ];

    pub fn constant(&self) -> &'static str {
        match self {
            ItemClass::GenericPassword => values::CLASS_GENERIC_PASSWORD,
            ItemClass::InternetPassword => values::CLASS_INTERNET_PASSWORD,
            ItemClass::Key => values::CLASS_KEY,
        }
    }

    pub fn from_constant(value: &str) -> Option<Self> {
        ItemClass::ALL.into_iter().find(|c| c.constant() == value)
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.constant())
    }
}

/// What a single-item read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// The raw secret bytes.
    Data,
    /// A reference to a backend-native object.
    Reference,
}

impl ReturnKind {
    pub fn attribute(&self) -> AttributeKey {
        match self {
            ReturnKind::Data => AttributeKey::RETURN_DATA,
            ReturnKind::Reference => AttributeKey::RETURN_REF,
        }
    }
}

/// Descriptor of a secret category. Implemented only by the three marker
/// types in this module.
pub trait SecretCategory: sealed::Sealed + fmt::Debug + Send + Sync + 'static {
    const CLASS: ItemClass;
    const RETURNS: ReturnKind;

    /// Whether a built-in attribute belongs to this category. Custom keys
    /// are always permitted.
    fn permits(key: &AttributeKey) -> bool {
        !key.is_known() || is_common(key) || Self::permits_specific(key)
    }

    /// Attributes only this category understands.
    fn permits_specific(key: &AttributeKey) -> bool;
}

fn is_common(key: &AttributeKey) -> bool {
    matches!(
        key.as_str(),
        "class"
            | "labl"
            | "sync"
            | "agrp"
            | "pdmn"
            | "accc"
            | "cdat"
            | "mdat"
            | "m_Limit"
            | "r_Data"
            | "r_Ref"
            | "r_Attributes"
            | "u_AuthCtx"
            | "u_AuthUI"
    )
}

/// An application password identified by account and service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericPassword;

/// A password scoped to a network server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternetPassword;

/// A cryptographic key stored as a backend-native key object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoKey;

impl sealed::Sealed for GenericPassword {}
impl sealed::Sealed for InternetPassword {}
impl sealed::Sealed for CryptoKey {}

impl SecretCategory for GenericPassword {
    const CLASS: ItemClass = ItemClass::GenericPassword;
    const RETURNS: ReturnKind = ReturnKind::Data;

    fn permits_specific(key: &AttributeKey) -> bool {
        matches!(
            key.as_str(),
            "acct" | "svce" | "gena" | "desc" | "icmt" | "v_Data"
        )
    }
}

impl SecretCategory for InternetPassword {
    const CLASS: ItemClass = ItemClass::InternetPassword;
    const RETURNS: ReturnKind = ReturnKind::Data;

    fn permits_specific(key: &AttributeKey) -> bool {
        matches!(
            key.as_str(),
            "acct" | "srvr" | "port" | "ptcl" | "atyp" | "path" | "sdmn" | "desc" | "icmt"
                | "v_Data"
        )
    }
}

impl SecretCategory for CryptoKey {
    const CLASS: ItemClass = ItemClass::Key;
    const RETURNS: ReturnKind = ReturnKind::Reference;

    fn permits_specific(key: &AttributeKey) -> bool {
        matches!(
            key.as_str(),
            "kcls" | "type" | "bsiz" | "atag" | "klbl" | "v_Ref"
        )
    }
}
