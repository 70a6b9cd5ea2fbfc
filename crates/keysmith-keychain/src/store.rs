//! The store facade.
//!
//! [`Keychain`] is one generic family of operations parameterized by secret
//! category. Every call lowers a [`Query`] into an attribute map, pins it to
//! the instance's access group, issues exactly one backend request (plus a
//! key or policy construction where needed) and translates the status.

use std::fmt;
use std::sync::Arc;

use keysmith_core::config::StoreConfig;
use keysmith_core::AccessPolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::access::build_policy;
use crate::attributes::{values, AttributeKey, AttributeMap, AttributeValue, AuthContext, Handle};
use crate::backend::{Backend, CopyResult};
use crate::category::{CryptoKey, GenericPassword, InternetPassword, ItemClass, SecretCategory};
use crate::convert::{ByteConvertible, KeyConvertible};
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::status;

/// The write-payload attribute (`v_Data` or `v_Ref`) of a value.
pub type Payload = (AttributeKey, AttributeValue);

/// A value that can be written to and read back from category `C`.
///
/// Byte-convertible values are stored as password data; key-convertible
/// values as backend-native keys.
pub trait Storable<C: SecretCategory>: Sized {
    /// The write-payload attribute for this value.
    fn to_payload<B: Backend + ?Sized>(&self, backend: &B) -> Result<Payload>;

    /// Rebuild the value from a single-item read.
    fn from_copy_result<B: Backend + ?Sized>(backend: &B, result: CopyResult) -> Result<Self>;

    /// Narrow a read or update query to items this type can come from.
    fn refine_query(_attributes: &mut AttributeMap) {}
}

fn data_payload<T: ByteConvertible>(value: &T) -> Payload {
    (
        AttributeKey::VALUE_DATA,
        AttributeValue::Bytes(value.raw_representation()),
    )
}

fn from_data<T: ByteConvertible>(result: CopyResult) -> Result<T> {
    match result {
        CopyResult::Data(bytes) => Ok(T::from_raw_representation(bytes.expose_secret())?),
        other => Err(StoreError::InvalidRepresentation(format!(
            "expected secret data, backend returned {}",
            result_kind(&other)
        ))),
    }
}

fn result_kind(result: &CopyResult) -> &'static str {
    match result {
        CopyResult::Data(_) => "data",
        CopyResult::Key(_) => "a key reference",
        CopyResult::Attributes(_) => "attributes",
        CopyResult::Items(_) => "a list of items",
    }
}

impl<T: ByteConvertible> Storable<GenericPassword> for T {
    fn to_payload<B: Backend + ?Sized>(&self, _backend: &B) -> Result<Payload> {
        Ok(data_payload(self))
    }

    fn from_copy_result<B: Backend + ?Sized>(_backend: &B, result: CopyResult) -> Result<Self> {
        from_data(result)
    }
}

impl<T: ByteConvertible> Storable<InternetPassword> for T {
    fn to_payload<B: Backend + ?Sized>(&self, _backend: &B) -> Result<Payload> {
        Ok(data_payload(self))
    }

    fn from_copy_result<B: Backend + ?Sized>(_backend: &B, result: CopyResult) -> Result<Self> {
        from_data(result)
    }
}

fn key_attributes<T: KeyConvertible>(attributes: &mut AttributeMap) {
    attributes.insert(AttributeKey::KEY_CLASS, T::KEY_CLASS.constant());
    attributes.insert(AttributeKey::KEY_TYPE, T::KEY_TYPE.constant());
    attributes.insert(AttributeKey::KEY_SIZE_IN_BITS, i64::from(T::KEY_SIZE_IN_BITS));
}

impl<T: KeyConvertible> Storable<CryptoKey> for T {
    fn to_payload<B: Backend + ?Sized>(&self, backend: &B) -> Result<Payload> {
        let mut attributes = AttributeMap::new();
        key_attributes::<T>(&mut attributes);

        let representation = self.x963_representation();
        let key = backend
            .create_key(representation.expose_secret(), &attributes)
            .map_err(|code| {
                StoreError::MissingKeyRepresentation(format!(
                    "backend could not build a key: {}",
                    status::describe(backend, code)
                ))
            })?;

        Ok((AttributeKey::VALUE_REF, AttributeValue::Handle(Handle::Key(key))))
    }

    fn from_copy_result<B: Backend + ?Sized>(backend: &B, result: CopyResult) -> Result<Self> {
        let key = match result {
            CopyResult::Key(key) => key,
            other => {
                return Err(StoreError::MissingKeyRepresentation(format!(
                    "expected a key reference, backend returned {}",
                    result_kind(&other)
                )))
            }
        };

        let representation = backend.export_key(&key).ok_or_else(|| {
            StoreError::MissingKeyRepresentation("backend could not export the key".to_string())
        })?;

        T::from_x963_representation(representation.expose_secret())
            .map_err(|e| StoreError::FailedKeyConversion(e.to_string()))
    }

    fn refine_query(attributes: &mut AttributeMap) {
        key_attributes::<T>(attributes);
    }
}

/// The serializable part of a [`Keychain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeychainSettings {
    /// Access group every operation is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_group: Option<String>,

    /// Policy applied by [`Keychain::store`].
    #[serde(default)]
    pub default_policy: AccessPolicy,
}

impl From<&StoreConfig> for KeychainSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            access_group: config.access_group.clone(),
            default_policy: config.default_policy.clone(),
        }
    }
}

/// A typed store over a credential backend.
///
/// Cheap to clone; clones share the backend. Two instances are equal when
/// they share the backend and have the same settings.
pub struct Keychain<B: Backend + ?Sized> {
    backend: Arc<B>,
    settings: KeychainSettings,
}

impl<B: Backend + ?Sized> Keychain<B> {
    /// An unscoped store using the backend's default access group.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_settings(backend, KeychainSettings::default())
    }

    /// A store whose operations are all pinned to `access_group`.
    pub fn with_access_group(backend: Arc<B>, access_group: impl Into<String>) -> Self {
        Self::with_settings(
            backend,
            KeychainSettings {
                access_group: Some(access_group.into()),
                ..KeychainSettings::default()
            },
        )
    }

    pub fn with_settings(backend: Arc<B>, settings: KeychainSettings) -> Self {
        Self { backend, settings }
    }

    /// Build a store from the `store` section of the configuration file.
    pub fn from_config(backend: Arc<B>, config: &StoreConfig) -> Self {
        Self::with_settings(backend, KeychainSettings::from(config))
    }

    pub fn settings(&self) -> &KeychainSettings {
        &self.settings
    }

    pub fn access_group(&self) -> Option<&str> {
        self.settings.access_group.as_deref()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Store `value` under the default policy. Never overwrites.
    pub fn store<C, V>(&self, value: &V, query: &Query<C>) -> Result<()>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        self.store_with_policy(value, query, &self.settings.default_policy)
    }

    /// Store `value` protected by `policy`. Never overwrites: an existing item
    /// with the same identity yields [`StoreError::DuplicateItem`].
    pub fn store_with_policy<C, V>(
        &self,
        value: &V,
        query: &Query<C>,
        policy: &AccessPolicy,
    ) -> Result<()>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        let mut attributes = self.scoped(query.build()?);

        let (key, payload) = value.to_payload(&*self.backend)?;
        attributes.insert(key, payload);
        self.apply_policy(&mut attributes, policy)?;

        debug!(class = %C::CLASS, scope = ?self.access_group(), "store");
        self.backend.add(&attributes).map_err(|code| {
            debug!(class = %C::CLASS, code = code.code(), "store failed");
            status::write_error(&*self.backend, code)
        })
    }

    /// Read back a single value. `Ok(None)` when nothing matches.
    pub fn retrieve<C, V>(&self, query: &Query<C>) -> Result<Option<V>>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        self.retrieve_inner(query, None)
    }

    /// Read back a single value using an already-evaluated authentication
    /// context. The backend is told not to prompt.
    pub fn retrieve_with_context<C, V>(
        &self,
        query: &Query<C>,
        context: &AuthContext,
    ) -> Result<Option<V>>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        self.retrieve_inner(query, Some(context))
    }

    fn retrieve_inner<C, V>(
        &self,
        query: &Query<C>,
        context: Option<&AuthContext>,
    ) -> Result<Option<V>>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        let mut attributes = self.scoped(query.build()?);
        V::refine_query(&mut attributes);
        strip_return_flags(&mut attributes);
        attributes.insert(AttributeKey::MATCH_LIMIT, values::MATCH_LIMIT_ONE);
        attributes.insert(C::RETURNS.attribute(), true);

        if let Some(context) = context {
            attributes.insert(
                AttributeKey::AUTHENTICATION_CONTEXT,
                Handle::AuthContext(context.clone()),
            );
            attributes.insert(AttributeKey::AUTHENTICATION_UI, values::AUTHENTICATION_UI_FAIL);
        }

        debug!(class = %C::CLASS, scope = ?self.access_group(), "retrieve");
        let result = status::read_outcome(&*self.backend, self.backend.copy_matching(&attributes))?;
        match result {
            Some(found) => V::from_copy_result(&*self.backend, found).map(Some),
            None => {
                debug!(class = %C::CLASS, "retrieve: not found");
                Ok(None)
            }
        }
    }

    /// Delete every item matching `query`. `false` if nothing matched.
    pub fn remove<C: SecretCategory>(&self, query: &Query<C>) -> Result<bool> {
        let mut attributes = self.scoped(query.build()?);
        strip_return_flags(&mut attributes);
        attributes.remove(&AttributeKey::MATCH_LIMIT);

        debug!(class = %C::CLASS, scope = ?self.access_group(), "remove");
        status::remove_outcome(&*self.backend, self.backend.delete(&attributes))
    }

    /// Delete every item of every category under this store's scope.
    ///
    /// Categories with nothing to delete are skipped; the first hard error
    /// aborts the sweep and is returned.
    pub fn remove_all(&self) -> Result<()> {
        for class in ItemClass::ALL {
            let mut attributes = AttributeMap::new();
            attributes.insert(AttributeKey::CLASS, class.constant());
            attributes.insert(AttributeKey::SYNCHRONIZABLE, values::SYNCHRONIZABLE_ANY);
            let attributes = self.scoped(attributes);

            match status::remove_outcome(&*self.backend, self.backend.delete(&attributes)) {
                Ok(removed) => debug!(%class, removed, "remove_all"),
                Err(e) => {
                    warn!(%class, scope = ?self.access_group(), error = %e, "remove_all aborted");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Attributes of every matching item. Secret data is never returned.
    pub fn enumerate<C: SecretCategory>(&self, query: &Query<C>) -> Result<Vec<AttributeMap>> {
        let mut attributes = self.scoped(query.build()?);
        strip_return_flags(&mut attributes);
        attributes.insert(AttributeKey::MATCH_LIMIT, values::MATCH_LIMIT_ALL);
        attributes.insert(AttributeKey::RETURN_ATTRIBUTES, true);

        debug!(class = %C::CLASS, scope = ?self.access_group(), "enumerate");
        match status::read_outcome(&*self.backend, self.backend.copy_matching(&attributes))? {
            None => Ok(Vec::new()),
            Some(CopyResult::Items(items)) => Ok(items),
            Some(CopyResult::Attributes(item)) => Ok(vec![item]),
            Some(other) => Err(StoreError::InvalidRepresentation(format!(
                "expected item attributes, backend returned {}",
                result_kind(&other)
            ))),
        }
    }

    /// Whether at least one item matches `query`.
    pub fn contains<C: SecretCategory>(&self, query: &Query<C>) -> Result<bool> {
        let mut attributes = self.scoped(query.build()?);
        strip_return_flags(&mut attributes);
        attributes.insert(AttributeKey::MATCH_LIMIT, values::MATCH_LIMIT_ONE);
        attributes.insert(AttributeKey::RETURN_ATTRIBUTES, true);

        let found = status::read_outcome(&*self.backend, self.backend.copy_matching(&attributes))?;
        Ok(found.is_some())
    }

    /// Replace the secret of every item matching `query`. `false` if nothing
    /// matched; no item is created. Key updates only touch items of the
    /// value's own key class, type and size.
    pub fn update<C, V>(&self, query: &Query<C>, value: &V) -> Result<bool>
    where
        C: SecretCategory,
        V: Storable<C>,
    {
        let mut attributes = self.scoped(query.build()?.without_controls());
        V::refine_query(&mut attributes);

        let mut changes = AttributeMap::new();
        let (key, payload) = value.to_payload(&*self.backend)?;
        changes.insert(key, payload);

        debug!(class = %C::CLASS, scope = ?self.access_group(), "update");
        status::update_outcome(&*self.backend, self.backend.update(&attributes, &changes))
    }

    /// Pin `attributes` to this store's access group, replacing any caller value.
    fn scoped(&self, mut attributes: AttributeMap) -> AttributeMap {
        if let Some(group) = &self.settings.access_group {
            attributes.insert(AttributeKey::ACCESS_GROUP, group.as_str());
        }
        attributes
    }

    /// Attach a fresh backend access-control object for `policy` as `accc`.
    /// A caller-supplied `pdmn` is dropped; the tier lives in the handle.
    fn apply_policy(&self, attributes: &mut AttributeMap, policy: &AccessPolicy) -> Result<()> {
        let handle = build_policy(&*self.backend, policy)?;
        attributes.remove(&AttributeKey::ACCESSIBLE);
        attributes.insert(AttributeKey::ACCESS_CONTROL, Handle::Policy(handle));
        Ok(())
    }
}

fn strip_return_flags(attributes: &mut AttributeMap) {
    attributes.remove(&AttributeKey::RETURN_DATA);
    attributes.remove(&AttributeKey::RETURN_REF);
    attributes.remove(&AttributeKey::RETURN_ATTRIBUTES);
}

impl<B: Backend + ?Sized> Clone for Keychain<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            settings: self.settings.clone(),
        }
    }
}

impl<B: Backend + ?Sized> PartialEq for Keychain<B> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend) && self.settings == other.settings
    }
}

impl<B: Backend + ?Sized> fmt::Debug for Keychain<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
