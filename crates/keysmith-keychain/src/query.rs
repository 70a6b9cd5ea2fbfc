//! Query construction.
//!
//! A [`Query`] is an ordered list of [`QueryOption`]s tagged with its secret
//! category. [`build_attributes`] lowers it into the backend's attribute map:
//! each option becomes exactly one attribute, later options overwrite earlier
//! ones with the same key, and the category discriminator is always injected
//! last so callers cannot override it.

use std::marker::PhantomData;

use keysmith_core::SecretBytes;

use crate::attributes::{values, AttributeKey, AttributeMap, AttributeValue};
use crate::category::{CryptoKey, GenericPassword, InternetPassword, SecretCategory};
use crate::convert::{KeyClass, KeyType};
use crate::error::{Result, StoreError};

/// Network protocol of an internet password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
    Ftp,
    Ssh,
    Smtp,
    Imap,
    Imaps,
    Ldap,
}

impl Protocol {
    pub fn constant(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "htps",
            Protocol::Ftp => "ftp ",
            Protocol::Ssh => "ssh ",
            Protocol::Smtp => "smtp",
            Protocol::Imap => "imap",
            Protocol::Imaps => "imps",
            Protocol::Ldap => "ldap",
        }
    }
}

/// Authentication scheme of an internet password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationType {
    Default,
    HttpBasic,
    HttpDigest,
    HtmlForm,
    Ntlm,
}

impl AuthenticationType {
    pub fn constant(&self) -> &'static str {
        match self {
            AuthenticationType::Default => "dflt",
            AuthenticationType::HttpBasic => "http",
            AuthenticationType::HttpDigest => "httd",
            AuthenticationType::HtmlForm => "form",
            AuthenticationType::Ntlm => "ntlm",
        }
    }
}

/// Synchronizable matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Synchronizable {
    Yes,
    No,
    /// Match both; only meaningful for reads and removes.
    Any,
}

/// How many items a read may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchLimit {
    One,
    All,
    Count(u32),
}

/// A single query specifier. Each lowers to exactly one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOption {
    Label(String),
    Description(String),
    Comment(String),
    Account(String),
    Service(String),
    Generic(SecretBytes),
    Server(String),
    Port(u16),
    Protocol(Protocol),
    AuthenticationType(AuthenticationType),
    Path(String),
    SecurityDomain(String),
    Synchronizable(Synchronizable),
    ApplicationTag(Vec<u8>),
    ApplicationLabel(Vec<u8>),
    KeyClass(KeyClass),
    KeyType(KeyType),
    KeySizeInBits(u32),
    MatchLimit(MatchLimit),
    ReturnData(bool),
    ReturnReference(bool),
    ReturnAttributes(bool),
    /// Passed through as-is; custom keys are not validated.
    Custom(AttributeKey, AttributeValue),
}

impl QueryOption {
    /// The attribute this option lowers to.
    pub fn to_attribute(&self) -> (AttributeKey, AttributeValue) {
        match self {
            Self::Label(v) => (AttributeKey::LABEL, v.as_str().into()),
            Self::Description(v) => (AttributeKey::DESCRIPTION, v.as_str().into()),
            Self::Comment(v) => (AttributeKey::COMMENT, v.as_str().into()),
            Self::Account(v) => (AttributeKey::ACCOUNT, v.as_str().into()),
            Self::Service(v) => (AttributeKey::SERVICE, v.as_str().into()),
            Self::Generic(v) => (AttributeKey::GENERIC, v.clone().into()),
            Self::Server(v) => (AttributeKey::SERVER, v.as_str().into()),
            Self::Port(v) => (AttributeKey::PORT, i64::from(*v).into()),
            Self::Protocol(v) => (AttributeKey::PROTOCOL, v.constant().into()),
            Self::AuthenticationType(v) => (AttributeKey::AUTHENTICATION_TYPE, v.constant().into()),
            Self::Path(v) => (AttributeKey::PATH, v.as_str().into()),
            Self::SecurityDomain(v) => (AttributeKey::SECURITY_DOMAIN, v.as_str().into()),
            Self::Synchronizable(v) => {
                let value = match v {
                    Synchronizable::Yes => AttributeValue::Bool(true),
                    Synchronizable::No => AttributeValue::Bool(false),
                    Synchronizable::Any => values::SYNCHRONIZABLE_ANY.into(),
                };
                (AttributeKey::SYNCHRONIZABLE, value)
            }
            Self::ApplicationTag(v) => (AttributeKey::APPLICATION_TAG, v.clone().into()),
            Self::ApplicationLabel(v) => (AttributeKey::APPLICATION_LABEL, v.clone().into()),
            Self::KeyClass(v) => (AttributeKey::KEY_CLASS, v.constant().into()),
            Self::KeyType(v) => (AttributeKey::KEY_TYPE, v.constant().into()),
            Self::KeySizeInBits(v) => (AttributeKey::KEY_SIZE_IN_BITS, i64::from(*v).into()),
            Self::MatchLimit(v) => {
                let value = match v {
                    MatchLimit::One => values::MATCH_LIMIT_ONE.into(),
                    MatchLimit::All => values::MATCH_LIMIT_ALL.into(),
                    MatchLimit::Count(n) => AttributeValue::Integer(i64::from(*n)),
                };
                (AttributeKey::MATCH_LIMIT, value)
            }
            Self::ReturnData(v) => (AttributeKey::RETURN_DATA, (*v).into()),
            Self::ReturnReference(v) => (AttributeKey::RETURN_REF, (*v).into()),
            Self::ReturnAttributes(v) => (AttributeKey::RETURN_ATTRIBUTES, (*v).into()),
            Self::Custom(key, value) => (key.clone(), value.clone()),
        }
    }
}

/// Lower `options` for category `C`.
///
/// Fails with [`StoreError::InvalidQuery`] when a built-in attribute does not
/// belong to the category.
pub fn build_attributes<C: SecretCategory>(options: &[QueryOption]) -> Result<AttributeMap> {
    let mut attributes = AttributeMap::new();

    for option in options {
        let (key, value) = option.to_attribute();
        if !C::permits(&key) {
            return Err(StoreError::InvalidQuery(format!(
                "attribute `{}` is not valid for {} items",
                key,
                C::CLASS
            )));
        }
        attributes.insert(key, value);
    }

    attributes.insert(AttributeKey::CLASS, C::CLASS.constant());
    Ok(attributes)
}

/// A category-tagged list of query options.
#[derive(Debug, Clone, PartialEq)]
pub struct Query<C: SecretCategory> {
    options: Vec<QueryOption>,
    _category: PhantomData<C>,
}

impl<C: SecretCategory> Default for Query<C> {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            _category: PhantomData,
        }
    }
}

impl<C: SecretCategory> Query<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option.
    pub fn with(mut self, option: QueryOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(&self) -> &[QueryOption] {
        &self.options
    }

    pub fn label(self, label: impl Into<String>) -> Self {
        self.with(QueryOption::Label(label.into()))
    }

    pub fn synchronizable(self, synchronizable: Synchronizable) -> Self {
        self.with(QueryOption::Synchronizable(synchronizable))
    }

    pub fn match_limit(self, limit: MatchLimit) -> Self {
        self.with(QueryOption::MatchLimit(limit))
    }

    pub fn custom(self, key: AttributeKey, value: impl Into<AttributeValue>) -> Self {
        self.with(QueryOption::Custom(key, value.into()))
    }

    /// Lower to the backend attribute map.
    pub fn build(&self) -> Result<AttributeMap> {
        build_attributes::<C>(&self.options)
    }
}

impl Query<GenericPassword> {
    pub fn account(self, account: impl Into<String>) -> Self {
        self.with(QueryOption::Account(account.into()))
    }

    pub fn service(self, service: impl Into<String>) -> Self {
        self.with(QueryOption::Service(service.into()))
    }

    pub fn generic(self, data: impl Into<SecretBytes>) -> Self {
        self.with(QueryOption::Generic(data.into()))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.with(QueryOption::Description(description.into()))
    }

    pub fn comment(self, comment: impl Into<String>) -> Self {
        self.with(QueryOption::Comment(comment.into()))
    }
}

impl Query<InternetPassword> {
    pub fn account(self, account: impl Into<String>) -> Self {
        self.with(QueryOption::Account(account.into()))
    }

    pub fn server(self, server: impl Into<String>) -> Self {
        self.with(QueryOption::Server(server.into()))
    }

    pub fn port(self, port: u16) -> Self {
        self.with(QueryOption::Port(port))
    }

    pub fn protocol(self, protocol: Protocol) -> Self {
        self.with(QueryOption::Protocol(protocol))
    }

    pub fn authentication_type(self, kind: AuthenticationType) -> Self {
        self.with(QueryOption::AuthenticationType(kind))
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        self.with(QueryOption::Path(path.into()))
    }

    pub fn security_domain(self, domain: impl Into<String>) -> Self {
        self.with(QueryOption::SecurityDomain(domain.into()))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.with(QueryOption::Description(description.into()))
    }

    pub fn comment(self, comment: impl Into<String>) -> Self {
        self.with(QueryOption::Comment(comment.into()))
    }
}

impl Query<CryptoKey> {
    pub fn application_tag(self, tag: impl Into<Vec<u8>>) -> Self {
        self.with(QueryOption::ApplicationTag(tag.into()))
    }

    pub fn application_label(self, label: impl Into<Vec<u8>>) -> Self {
        self.with(QueryOption::ApplicationLabel(label.into()))
    }

    pub fn key_class(self, class: KeyClass) -> Self {
        self.with(QueryOption::KeyClass(class))
    }

    pub fn key_type(self, kind: KeyType) -> Self {
        self.with(QueryOption::KeyType(kind))
    }

    pub fn key_size_in_bits(self, bits: u32) -> Self {
        self.with(QueryOption::KeySizeInBits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_always_injected() {
        let attrs = build_attributes::<GenericPassword>(&[]).unwrap();
        assert_eq!(attrs.class(), Some("genp"));
        assert_eq!(attrs.len(), 1);

        let attrs = Query::<CryptoKey>::new().build().unwrap();
        assert_eq!(attrs.class(), Some("keys"));
    }

    #[test]
    fn test_discriminator_not_settable() {
        let attrs = Query::<InternetPassword>::new()
            .custom(AttributeKey::CLASS, "keys")
            .build()
            .unwrap();
        assert_eq!(attrs.class(), Some("inet"));
    }

    #[test]
    fn test_last_write_wins() {
        let attrs = Query::<GenericPassword>::new()
            .label("first")
            .account("alice")
            .label("second")
            .build()
            .unwrap();

        assert_eq!(attrs.get_str(&AttributeKey::LABEL), Some("second"));
        assert_eq!(attrs.get_str(&AttributeKey::ACCOUNT), Some("alice"));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_internet_password_attributes() {
        let attrs = Query::<InternetPassword>::new()
            .server("example.com")
            .port(443)
            .protocol(Protocol::Https)
            .authentication_type(AuthenticationType::HtmlForm)
            .account("bob")
            .build()
            .unwrap();

        assert_eq!(attrs.get_str(&AttributeKey::SERVER), Some("example.com"));
        assert_eq!(
            attrs.get(&AttributeKey::PORT),
            Some(&AttributeValue::Integer(443))
        );
        assert_eq!(attrs.get_str(&AttributeKey::PROTOCOL), Some("htps"));
        assert_eq!(attrs.get_str(&AttributeKey::AUTHENTICATION_TYPE), Some("form"));
    }

    #[test]
    fn test_match_limit_and_sync_lowering() {
        let attrs = Query::<GenericPassword>::new()
            .match_limit(MatchLimit::Count(5))
            .synchronizable(Synchronizable::Any)
            .build()
            .unwrap();
        assert_eq!(
            attrs.get(&AttributeKey::MATCH_LIMIT),
            Some(&AttributeValue::Integer(5))
        );
        assert_eq!(attrs.get_str(&AttributeKey::SYNCHRONIZABLE), Some("syna"));

        let attrs = Query::<GenericPassword>::new()
            .synchronizable(Synchronizable::Yes)
            .build()
            .unwrap();
        assert_eq!(attrs.get_bool(&AttributeKey::SYNCHRONIZABLE), Some(true));
    }

    #[test]
    fn test_foreign_attribute_rejected() {
        let result = Query::<GenericPassword>::new()
            .with(QueryOption::Server("example.com".into()))
            .build();
        assert!(matches!(result, Err(StoreError::InvalidQuery(_))));

        let result = Query::<CryptoKey>::new()
            .with(QueryOption::Account("alice".into()))
            .build();
        assert!(matches!(result, Err(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_custom_attribute_preserved() {
        let attrs = Query::<CryptoKey>::new()
            .custom(AttributeKey::custom("x-vendor"), 7i64)
            .build()
            .unwrap();
        assert_eq!(
            attrs.get(&AttributeKey::custom("x-vendor")),
            Some(&AttributeValue::Integer(7))
        );
    }

    #[test]
    fn test_key_query_attributes() {
        let attrs = Query::<CryptoKey>::new()
            .application_tag(b"com.example.signing".to_vec())
            .key_class(KeyClass::Private)
            .key_type(KeyType::EcSecPrimeRandom)
            .key_size_in_bits(256)
            .build()
            .unwrap();
        assert_eq!(attrs.get_str(&AttributeKey::KEY_CLASS), Some("1"));
        assert_eq!(attrs.get_str(&AttributeKey::KEY_TYPE), Some("73"));
        assert_eq!(
            attrs.get(&AttributeKey::KEY_SIZE_IN_BITS),
            Some(&AttributeValue::Integer(256))
        );
    }
}
