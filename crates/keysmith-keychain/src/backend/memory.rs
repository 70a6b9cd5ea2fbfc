//! In-process backend.
//!
//! Behaves like an add-only keychain: writes are rejected when an item with
//! the same class-specific primary key already exists, storage is partitioned
//! by access group, and a query without a synchronizable attribute only sees
//! non-synchronizable items. Every request is journaled so callers can
//! inspect exactly what was sent.

use std::collections::HashMap;

use chrono::Utc;
use keysmith_core::{AccessPolicy, SecretBytes};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use super::{Backend, CopyResult};
use crate::attributes::{
    values, AttributeKey, AttributeMap, AttributeValue, Handle, KeyHandle, PolicyHandle,
};
use crate::category::ItemClass;
use crate::convert::{KeyClass, KeyType};
use crate::status::Status;

/// Access group assigned to items written without one.
const DEFAULT_GROUP: &str = "default";

/// Length of the generated application label.
const APPLICATION_LABEL_LEN: usize = 20;

/// Backend verb, as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Add,
    CopyMatching,
    Delete,
    Update,
    CreateAccessControl,
    CreateKey,
}

/// A journaled backend request.
#[derive(Debug, Clone)]
pub struct Request {
    pub verb: Verb,
    pub attributes: AttributeMap,
}

#[derive(Debug)]
struct MemoryKey {
    class: KeyClass,
    key_type: KeyType,
    size_in_bits: u32,
    representation: SecretBytes,
}

#[derive(Debug)]
struct MemoryPolicy {
    policy: AccessPolicy,
}

#[derive(Debug, Clone)]
enum Payload {
    Data(SecretBytes),
    Key(KeyHandle),
}

#[derive(Debug, Clone)]
struct StoredItem {
    class: ItemClass,
    attributes: AttributeMap,
    payload: Payload,
    policy: Option<PolicyHandle>,
}

/// An in-memory credential backend.
pub struct MemoryBackend {
    items: Mutex<Vec<StoredItem>>,
    journal: Mutex<Vec<Request>>,
    failures: Mutex<HashMap<Verb, Status>>,
    extractable_keys: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            extractable_keys: true,
        }
    }

    /// A backend whose keys refuse to export their representation.
    pub fn with_non_extractable_keys() -> Self {
        Self {
            extractable_keys: false,
            ..Self::new()
        }
    }

    /// Make every subsequent `verb` call fail with `status` until cleared.
    pub fn inject_failure(&self, verb: Verb, status: Status) {
        self.failures.lock().insert(verb, status);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.journal.lock().clone()
    }

    /// The most recent request for `verb`.
    pub fn last_request(&self, verb: Verb) -> Option<Request> {
        self.journal
            .lock()
            .iter()
            .rev()
            .find(|r| r.verb == verb)
            .cloned()
    }

    /// Number of stored items across all groups.
    pub fn item_count(&self) -> usize {
        self.items.lock().len()
    }

    fn begin(&self, verb: Verb, attributes: &AttributeMap) -> Result<(), Status> {
        trace!(?verb, ?attributes, "memory backend request");
        self.journal.lock().push(Request {
            verb,
            attributes: attributes.clone(),
        });
        match self.failures.lock().get(&verb) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

fn class_of(attributes: &AttributeMap) -> Result<ItemClass, Status> {
    attributes
        .class()
        .and_then(ItemClass::from_constant)
        .ok_or(Status::PARAM)
}

fn primary_keys(class: ItemClass) -> &'static [AttributeKey] {
    match class {
        ItemClass::GenericPassword => &[
            AttributeKey::ACCOUNT,
            AttributeKey::SERVICE,
            AttributeKey::ACCESS_GROUP,
            AttributeKey::SYNCHRONIZABLE,
        ],
        ItemClass::InternetPassword => &[
            AttributeKey::ACCOUNT,
            AttributeKey::SECURITY_DOMAIN,
            AttributeKey::SERVER,
            AttributeKey::PROTOCOL,
            AttributeKey::AUTHENTICATION_TYPE,
            AttributeKey::PORT,
            AttributeKey::PATH,
            AttributeKey::ACCESS_GROUP,
            AttributeKey::SYNCHRONIZABLE,
        ],
        ItemClass::Key => &[
            AttributeKey::KEY_CLASS,
            AttributeKey::APPLICATION_LABEL,
            AttributeKey::APPLICATION_TAG,
            AttributeKey::KEY_TYPE,
            AttributeKey::KEY_SIZE_IN_BITS,
            AttributeKey::ACCESS_GROUP,
            AttributeKey::SYNCHRONIZABLE,
        ],
    }
}

fn same_primary_key(class: ItemClass, a: &AttributeMap, b: &AttributeMap) -> bool {
    primary_keys(class).iter().all(|key| a.get(key) == b.get(key))
}

/// Whether `item` satisfies every matching attribute of `query`.
fn item_matches(class: ItemClass, query: &AttributeMap, item: &StoredItem) -> bool {
    if item.class != class {
        return false;
    }

    let group = query
        .get_str(&AttributeKey::ACCESS_GROUP)
        .unwrap_or(DEFAULT_GROUP);
    if item.attributes.get_str(&AttributeKey::ACCESS_GROUP) != Some(group) {
        return false;
    }

    let item_sync = item
        .attributes
        .get_bool(&AttributeKey::SYNCHRONIZABLE)
        .unwrap_or(false);
    match query.get(&AttributeKey::SYNCHRONIZABLE) {
        None => {
            if item_sync {
                return false;
            }
        }
        Some(AttributeValue::Bool(wanted)) => {
            if *wanted != item_sync {
                return false;
            }
        }
        Some(AttributeValue::String(s)) if s == values::SYNCHRONIZABLE_ANY => {}
        Some(_) => return false,
    }

    query
        .iter()
        .filter(|(key, _)| {
            !key.is_control()
                && **key != AttributeKey::CLASS
                && **key != AttributeKey::ACCESS_GROUP
                && **key != AttributeKey::SYNCHRONIZABLE
        })
        .all(|(key, value)| item.attributes.get(key) == Some(value))
}

/// Requested match limit; `None` means unbounded.
fn match_limit(query: &AttributeMap) -> Result<Option<usize>, Status> {
    match query.get(&AttributeKey::MATCH_LIMIT) {
        None => Ok(Some(1)),
        Some(AttributeValue::String(s)) if s == values::MATCH_LIMIT_ONE => Ok(Some(1)),
        Some(AttributeValue::String(s)) if s == values::MATCH_LIMIT_ALL => Ok(None),
        Some(AttributeValue::Integer(n)) if *n > 0 => Ok(Some(*n as usize)),
        Some(_) => Err(Status::PARAM),
    }
}

/// Expected X9.63 length for an EC key of `bits` in `class`.
fn ec_representation_len(class: KeyClass, bits: u32) -> Option<usize> {
    let field = (bits as usize + 7) / 8;
    match class {
        KeyClass::Public => Some(1 + 2 * field),
        KeyClass::Private => Some(1 + 3 * field),
        KeyClass::Symmetric => None,
    }
}

/// Infer the curve size from an X9.63 length.
fn ec_bits_from_len(class: KeyClass, len: usize) -> Option<u32> {
    [256u32, 384, 521]
        .into_iter()
        .find(|bits| ec_representation_len(class, *bits) == Some(len))
}

/// Label shared by both halves of a key pair: a digest of the public point.
fn application_label(key: &MemoryKey) -> Vec<u8> {
    let material = key.representation.expose_secret();
    let point_len = ec_representation_len(KeyClass::Public, key.size_in_bits)
        .unwrap_or(material.len())
        .min(material.len());
    Sha256::digest(&material[..point_len])[..APPLICATION_LABEL_LEN].to_vec()
}

fn requires_authentication(item: &StoredItem) -> bool {
    item.policy
        .as_ref()
        .and_then(|handle| handle.downcast_ref::<MemoryPolicy>())
        .map(|p| !p.policy.capabilities.is_empty())
        .unwrap_or(false)
}

impl MemoryBackend {
    /// Normalize a write into a stored item.
    fn prepare(&self, class: ItemClass, attributes: &AttributeMap) -> Result<StoredItem, Status> {
        let mut item_attributes = attributes.without_controls();

        if !item_attributes.contains_key(&AttributeKey::ACCESS_GROUP) {
            item_attributes.insert(AttributeKey::ACCESS_GROUP, DEFAULT_GROUP);
        }
        match item_attributes.get(&AttributeKey::SYNCHRONIZABLE) {
            None => {
                item_attributes.insert(AttributeKey::SYNCHRONIZABLE, false);
            }
            Some(AttributeValue::Bool(_)) => {}
            Some(_) => return Err(Status::PARAM),
        }
        if let Some(protection) = item_attributes.get(&AttributeKey::ACCESSIBLE) {
            const CLASSES: [&str; 7] = ["ak", "aku", "ck", "cku", "dk", "dku", "akpu"];
            if !protection.as_str().is_some_and(|p| CLASSES.contains(&p)) {
                return Err(Status::PARAM);
            }
        }

        let policy = match attributes.get(&AttributeKey::ACCESS_CONTROL) {
            None => None,
            Some(AttributeValue::Handle(Handle::Policy(handle))) => {
                let memory = handle.downcast_ref::<MemoryPolicy>().ok_or(Status::PARAM)?;
                if item_attributes.contains_key(&AttributeKey::ACCESSIBLE) {
                    return Err(Status::PARAM);
                }
                if let Some(class) = memory.policy.protection.class_constant() {
                    item_attributes.insert(AttributeKey::ACCESSIBLE, class);
                }
                Some(handle.clone())
            }
            Some(_) => return Err(Status::PARAM),
        };

        let payload = match class {
            ItemClass::Key => {
                let handle = match attributes.get(&AttributeKey::VALUE_REF) {
                    Some(AttributeValue::Handle(Handle::Key(handle))) => handle.clone(),
                    _ => return Err(Status::PARAM),
                };
                let key = handle.downcast_ref::<MemoryKey>().ok_or(Status::PARAM)?;

                item_attributes.insert(AttributeKey::KEY_CLASS, key.class.constant());
                item_attributes.insert(AttributeKey::KEY_TYPE, key.key_type.constant());
                item_attributes
                    .insert(AttributeKey::KEY_SIZE_IN_BITS, i64::from(key.size_in_bits));
                if !item_attributes.contains_key(&AttributeKey::APPLICATION_LABEL) {
                    item_attributes.insert(AttributeKey::APPLICATION_LABEL, application_label(key));
                }
                Payload::Key(handle)
            }
            _ => match attributes.get(&AttributeKey::VALUE_DATA) {
                None => Payload::Data(SecretBytes::default()),
                Some(AttributeValue::Bytes(bytes)) => Payload::Data(bytes.clone()),
                Some(_) => return Err(Status::PARAM),
            },
        };

        let now = Utc::now();
        item_attributes.insert(AttributeKey::CREATION_DATE, now);
        item_attributes.insert(AttributeKey::MODIFICATION_DATE, now);

        Ok(StoredItem {
            class,
            attributes: item_attributes,
            payload,
            policy,
        })
    }

    fn export(&self, key: &KeyHandle) -> Option<SecretBytes> {
        if !self.extractable_keys {
            return None;
        }
        key.downcast_ref::<MemoryKey>()
            .map(|k| k.representation.clone())
    }
}

impl Backend for MemoryBackend {
    fn add(&self, attributes: &AttributeMap) -> Result<(), Status> {
        self.begin(Verb::Add, attributes)?;
        let class = class_of(attributes)?;
        let item = self.prepare(class, attributes)?;

        let mut items = self.items.lock();
        let duplicate = items.iter().any(|existing| {
            existing.class == class
                && same_primary_key(class, &existing.attributes, &item.attributes)
        });
        if duplicate {
            debug!(%class, "add rejected: duplicate item");
            return Err(Status::DUPLICATE_ITEM);
        }
        items.push(item);
        debug!(%class, count = items.len(), "item added");
        Ok(())
    }

    fn copy_matching(&self, query: &AttributeMap) -> Result<CopyResult, Status> {
        self.begin(Verb::CopyMatching, query)?;
        let class = class_of(query)?;
        let limit = match_limit(query)?;

        let wants_data = query.get_bool(&AttributeKey::RETURN_DATA).unwrap_or(false);
        let wants_ref = query.get_bool(&AttributeKey::RETURN_REF).unwrap_or(false);
        let wants_attributes = query
            .get_bool(&AttributeKey::RETURN_ATTRIBUTES)
            .unwrap_or(false);

        let items = self.items.lock();
        let found: Vec<&StoredItem> = items
            .iter()
            .filter(|item| item_matches(class, query, item))
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        if found.is_empty() {
            return Err(Status::ITEM_NOT_FOUND);
        }

        let ui_suppressed = query.get_str(&AttributeKey::AUTHENTICATION_UI)
            == Some(values::AUTHENTICATION_UI_FAIL);
        let has_context = matches!(
            query.get(&AttributeKey::AUTHENTICATION_CONTEXT),
            Some(AttributeValue::Handle(Handle::AuthContext(_)))
        );
        if ui_suppressed && !has_context && found.iter().copied().any(requires_authentication) {
            return Err(Status::INTERACTION_NOT_ALLOWED);
        }

        match (limit, wants_data, wants_ref, wants_attributes) {
            (Some(1), true, false, false) => match &found[0].payload {
                Payload::Data(bytes) => Ok(CopyResult::Data(bytes.clone())),
                Payload::Key(handle) => self
                    .export(handle)
                    .map(CopyResult::Data)
                    .ok_or(Status::PARAM),
            },
            (Some(1), false, true, false) => match &found[0].payload {
                Payload::Key(handle) => Ok(CopyResult::Key(handle.clone())),
                Payload::Data(_) => Err(Status::PARAM),
            },
            (Some(1), false, false, true) => {
                Ok(CopyResult::Attributes(found[0].attributes.clone()))
            }
            (_, false, false, true) => Ok(CopyResult::Items(
                found.iter().map(|item| item.attributes.clone()).collect(),
            )),
            _ => Err(Status::PARAM),
        }
    }

    fn delete(&self, query: &AttributeMap) -> Result<(), Status> {
        self.begin(Verb::Delete, query)?;
        let class = class_of(query)?;

        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| !item_matches(class, query, item));
        let removed = before - items.len();

        debug!(%class, removed, "delete");
        if removed == 0 {
            Err(Status::ITEM_NOT_FOUND)
        } else {
            Ok(())
        }
    }

    fn update(&self, query: &AttributeMap, changes: &AttributeMap) -> Result<(), Status> {
        self.begin(Verb::Update, query)?;
        let class = class_of(query)?;
        if changes.contains_key(&AttributeKey::CLASS) {
            return Err(Status::PARAM);
        }

        let mut items = self.items.lock();
        let targets: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item_matches(class, query, item))
            .map(|(i, _)| i)
            .collect();
        if targets.is_empty() {
            return Err(Status::ITEM_NOT_FOUND);
        }

        let mut updated: Vec<(usize, StoredItem)> = Vec::with_capacity(targets.len());
        for &index in &targets {
            let mut item = items[index].clone();
            for (key, value) in changes.without_controls() {
                item.attributes.insert(key, value);
            }
            match changes.get(&AttributeKey::VALUE_DATA) {
                None => {}
                Some(AttributeValue::Bytes(bytes)) if class != ItemClass::Key => {
                    item.payload = Payload::Data(bytes.clone());
                }
                Some(_) => return Err(Status::PARAM),
            }
            match changes.get(&AttributeKey::VALUE_REF) {
                None => {}
                Some(AttributeValue::Handle(Handle::Key(handle))) if class == ItemClass::Key => {
                    let key = handle.downcast_ref::<MemoryKey>().ok_or(Status::PARAM)?;
                    item.attributes
                        .insert(AttributeKey::KEY_CLASS, key.class.constant());
                    item.attributes
                        .insert(AttributeKey::KEY_TYPE, key.key_type.constant());
                    item.attributes
                        .insert(AttributeKey::KEY_SIZE_IN_BITS, i64::from(key.size_in_bits));
                    if !changes.contains_key(&AttributeKey::APPLICATION_LABEL) {
                        item.attributes
                            .insert(AttributeKey::APPLICATION_LABEL, application_label(key));
                    }
                    item.payload = Payload::Key(handle.clone());
                }
                Some(_) => return Err(Status::PARAM),
            }
            item.attributes
                .insert(AttributeKey::MODIFICATION_DATE, Utc::now());

            let collides = items.iter().enumerate().any(|(i, other)| {
                !targets.contains(&i)
                    && other.class == class
                    && same_primary_key(class, &other.attributes, &item.attributes)
            }) || updated
                .iter()
                .any(|(_, other)| same_primary_key(class, &other.attributes, &item.attributes));
            if collides {
                return Err(Status::DUPLICATE_ITEM);
            }
            updated.push((index, item));
        }

        for (index, item) in updated {
            items[index] = item;
        }
        debug!(%class, count = targets.len(), "update");
        Ok(())
    }

    fn create_access_control(&self, policy: &AccessPolicy) -> Result<PolicyHandle, Status> {
        self.begin(Verb::CreateAccessControl, &AttributeMap::new())?;
        let conflicts = policy.conflicts();
        if !conflicts.is_empty() {
            debug!(?conflicts, "access control rejected");
            return Err(Status::PARAM);
        }
        Ok(PolicyHandle::new(MemoryPolicy {
            policy: policy.clone(),
        }))
    }

    fn create_key(
        &self,
        representation: &[u8],
        attributes: &AttributeMap,
    ) -> Result<KeyHandle, Status> {
        self.begin(Verb::CreateKey, attributes)?;

        let class = attributes
            .get_str(&AttributeKey::KEY_CLASS)
            .and_then(KeyClass::from_constant)
            .ok_or(Status::PARAM)?;
        let key_type = attributes
            .get_str(&AttributeKey::KEY_TYPE)
            .and_then(KeyType::from_constant)
            .ok_or(Status::PARAM)?;
        if class == KeyClass::Symmetric {
            return Err(Status::UNIMPLEMENTED);
        }

        let size_in_bits = match attributes
            .get(&AttributeKey::KEY_SIZE_IN_BITS)
            .and_then(AttributeValue::as_integer)
        {
            Some(bits) => u32::try_from(bits).map_err(|_| Status::PARAM)?,
            None => ec_bits_from_len(class, representation.len()).ok_or(Status::DECODE)?,
        };

        if ec_representation_len(class, size_in_bits) != Some(representation.len())
            || representation.first() != Some(&0x04)
        {
            debug!(len = representation.len(), size_in_bits, "key representation rejected");
            return Err(Status::DECODE);
        }

        Ok(KeyHandle::new(MemoryKey {
            class,
            key_type,
            size_in_bits,
            representation: SecretBytes::from(representation),
        }))
    }

    fn export_key(&self, key: &KeyHandle) -> Option<SecretBytes> {
        self.export(key)
    }

    fn describe_status(&self, status: Status) -> Option<String> {
        let message = match status {
            Status::SUCCESS => "No error.",
            Status::UNIMPLEMENTED => "Function or operation not implemented.",
            Status::PARAM => "One or more parameters passed to a function were not valid.",
            Status::ALLOCATE => "Failed to allocate memory.",
            Status::USER_CANCELED => "User canceled the operation.",
            Status::NOT_AVAILABLE => "No keychain is available.",
            Status::AUTH_FAILED => "The user name or passphrase you entered is not correct.",
            Status::DUPLICATE_ITEM => "The specified item already exists in the keychain.",
            Status::ITEM_NOT_FOUND => "The specified item could not be found in the keychain.",
            Status::INTERACTION_NOT_ALLOWED => "User interaction is not allowed.",
            Status::DECODE => "Unable to decode the provided data.",
            Status::MISSING_ENTITLEMENT => "A required entitlement isn't present.",
            _ => return None,
        };
        Some(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AuthContext;
    use keysmith_core::{Availability, Capability, CapabilitySet, Protection};

    fn password(account: &str, secret: &[u8]) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert(AttributeKey::CLASS, values::CLASS_GENERIC_PASSWORD);
        attrs.insert(AttributeKey::ACCOUNT, account);
        attrs.insert(AttributeKey::VALUE_DATA, secret.to_vec());
        attrs
    }

    fn lookup(account: &str) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert(AttributeKey::CLASS, values::CLASS_GENERIC_PASSWORD);
        attrs.insert(AttributeKey::ACCOUNT, account);
        attrs.insert(AttributeKey::RETURN_DATA, true);
        attrs
    }

    #[test]
    fn test_add_then_copy() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"pw")).unwrap();

        match backend.copy_matching(&lookup("alice")).unwrap() {
            CopyResult::Data(bytes) => assert_eq!(bytes.expose_secret(), b"pw"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_add_is_add_only() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"one")).unwrap();
        assert_eq!(
            backend.add(&password("alice", b"two")),
            Err(Status::DUPLICATE_ITEM)
        );
        assert_eq!(backend.item_count(), 1);
    }

    #[test]
    fn test_label_is_not_part_of_primary_key() {
        let backend = MemoryBackend::new();
        let mut first = password("alice", b"one");
        first.insert(AttributeKey::LABEL, "first");
        let mut second = password("alice", b"two");
        second.insert(AttributeKey::LABEL, "second");

        backend.add(&first).unwrap();
        assert_eq!(backend.add(&second), Err(Status::DUPLICATE_ITEM));
    }

    #[test]
    fn test_groups_are_partitioned() {
        let backend = MemoryBackend::new();
        let mut item = password("alice", b"pw");
        item.insert(AttributeKey::ACCESS_GROUP, "group.a");
        backend.add(&item).unwrap();

        assert_eq!(
            backend.copy_matching(&lookup("alice")),
            Err(Status::ITEM_NOT_FOUND)
        );

        let mut query = lookup("alice");
        query.insert(AttributeKey::ACCESS_GROUP, "group.b");
        assert_eq!(backend.copy_matching(&query), Err(Status::ITEM_NOT_FOUND));

        query.insert(AttributeKey::ACCESS_GROUP, "group.a");
        assert!(backend.copy_matching(&query).is_ok());
    }

    #[test]
    fn test_synchronizable_matching() {
        let backend = MemoryBackend::new();
        let mut item = password("alice", b"pw");
        item.insert(AttributeKey::SYNCHRONIZABLE, true);
        backend.add(&item).unwrap();

        assert_eq!(
            backend.copy_matching(&lookup("alice")),
            Err(Status::ITEM_NOT_FOUND)
        );

        let mut query = lookup("alice");
        query.insert(AttributeKey::SYNCHRONIZABLE, values::SYNCHRONIZABLE_ANY);
        assert!(backend.copy_matching(&query).is_ok());
    }

    #[test]
    fn test_delete_reports_not_found() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.delete(&lookup("ghost")), Err(Status::ITEM_NOT_FOUND));

        backend.add(&password("alice", b"pw")).unwrap();
        assert_eq!(backend.delete(&lookup("alice")), Ok(()));
        assert_eq!(backend.item_count(), 0);
    }

    #[test]
    fn test_copy_all_returns_attributes_without_data() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"a")).unwrap();
        backend.add(&password("bob", b"b")).unwrap();

        let mut query = AttributeMap::new();
        query.insert(AttributeKey::CLASS, values::CLASS_GENERIC_PASSWORD);
        query.insert(AttributeKey::MATCH_LIMIT, values::MATCH_LIMIT_ALL);
        query.insert(AttributeKey::RETURN_ATTRIBUTES, true);

        match backend.copy_matching(&query).unwrap() {
            CopyResult::Items(items) => {
                assert_eq!(items.len(), 2);
                assert!(items
                    .iter()
                    .all(|i| !i.contains_key(&AttributeKey::VALUE_DATA)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_data_with_limit_all_is_rejected() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"a")).unwrap();

        let mut query = lookup("alice");
        query.insert(AttributeKey::MATCH_LIMIT, values::MATCH_LIMIT_ALL);
        assert_eq!(backend.copy_matching(&query), Err(Status::PARAM));
    }

    #[test]
    fn test_update_replaces_data() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"old")).unwrap();

        let mut changes = AttributeMap::new();
        changes.insert(AttributeKey::VALUE_DATA, b"new".to_vec());
        backend.update(&lookup("alice"), &changes).unwrap();

        match backend.copy_matching(&lookup("alice")).unwrap() {
            CopyResult::Data(bytes) => assert_eq!(bytes.expose_secret(), b"new"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_update_collision_is_duplicate() {
        let backend = MemoryBackend::new();
        backend.add(&password("alice", b"a")).unwrap();
        backend.add(&password("bob", b"b")).unwrap();

        let mut changes = AttributeMap::new();
        changes.insert(AttributeKey::ACCOUNT, "bob");
        assert_eq!(
            backend.update(&lookup("alice"), &changes),
            Err(Status::DUPLICATE_ITEM)
        );
    }

    fn key_item(backend: &MemoryBackend, class: KeyClass, material: &[u8]) -> AttributeMap {
        let mut key_attrs = AttributeMap::new();
        key_attrs.insert(AttributeKey::KEY_CLASS, class.constant());
        key_attrs.insert(AttributeKey::KEY_TYPE, KeyType::EcSecPrimeRandom.constant());
        let key = backend.create_key(material, &key_attrs).unwrap();

        let mut attrs = AttributeMap::new();
        attrs.insert(AttributeKey::CLASS, values::CLASS_KEY);
        attrs.insert(AttributeKey::APPLICATION_TAG, b"tag".to_vec());
        attrs.insert(AttributeKey::VALUE_REF, Handle::Key(key));
        attrs
    }

    fn key_pair_material() -> (Vec<u8>, Vec<u8>) {
        let mut private = vec![0x04];
        private.extend_from_slice(&[3u8; 96]);
        (private[..65].to_vec(), private)
    }

    #[test]
    fn test_update_with_key_recomputes_label() {
        let backend = MemoryBackend::new();
        let (public, _) = key_pair_material();
        backend.add(&key_item(&backend, KeyClass::Public, &public)).unwrap();

        let mut other = vec![0x04];
        other.extend_from_slice(&[9u8; 64]);
        let replacement = key_item(&backend, KeyClass::Public, &other);

        let mut query = AttributeMap::new();
        query.insert(AttributeKey::CLASS, values::CLASS_KEY);
        query.insert(AttributeKey::APPLICATION_TAG, b"tag".to_vec());

        let mut changes = AttributeMap::new();
        changes.insert(
            AttributeKey::VALUE_REF,
            replacement.get(&AttributeKey::VALUE_REF).unwrap().clone(),
        );
        backend.update(&query, &changes).unwrap();

        query.insert(AttributeKey::RETURN_ATTRIBUTES, true);
        match backend.copy_matching(&query).unwrap() {
            CopyResult::Attributes(attrs) => assert_eq!(
                attrs.get(&AttributeKey::APPLICATION_LABEL),
                Some(&AttributeValue::from(
                    Sha256::digest(&other)[..APPLICATION_LABEL_LEN].to_vec()
                ))
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_update_collision_among_targets_is_duplicate() {
        let backend = MemoryBackend::new();
        let (public, private) = key_pair_material();
        backend.add(&key_item(&backend, KeyClass::Private, &private)).unwrap();
        backend.add(&key_item(&backend, KeyClass::Public, &public)).unwrap();

        // Turning both halves into the same public key would leave two
        // items with one identity.
        let replacement = key_item(&backend, KeyClass::Public, &public);
        let mut query = AttributeMap::new();
        query.insert(AttributeKey::CLASS, values::CLASS_KEY);
        query.insert(AttributeKey::APPLICATION_TAG, b"tag".to_vec());
        let mut changes = AttributeMap::new();
        changes.insert(
            AttributeKey::VALUE_REF,
            replacement.get(&AttributeKey::VALUE_REF).unwrap().clone(),
        );

        assert_eq!(backend.update(&query, &changes), Err(Status::DUPLICATE_ITEM));

        query.insert(AttributeKey::KEY_CLASS, KeyClass::Private.constant());
        query.insert(AttributeKey::RETURN_ATTRIBUTES, true);
        assert!(backend.copy_matching(&query).is_ok());
    }

    #[test]
    fn test_access_control_records_protection_class() {
        let backend = MemoryBackend::new();
        let handle = backend
            .create_access_control(&AccessPolicy::with_protection(
                Protection::this_device_only(Availability::AfterFirstUnlock),
            ))
            .unwrap();

        let mut item = password("alice", b"pw");
        item.insert(AttributeKey::ACCESS_CONTROL, Handle::Policy(handle.clone()));
        backend.add(&item).unwrap();

        let mut query = lookup("alice");
        query.remove(&AttributeKey::RETURN_DATA);
        query.insert(AttributeKey::RETURN_ATTRIBUTES, true);
        match backend.copy_matching(&query).unwrap() {
            CopyResult::Attributes(attrs) => {
                assert_eq!(attrs.get_str(&AttributeKey::ACCESSIBLE), Some("cku"))
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut both = password("bob", b"pw");
        both.insert(AttributeKey::ACCESS_CONTROL, Handle::Policy(handle));
        both.insert(AttributeKey::ACCESSIBLE, "aku");
        assert_eq!(backend.add(&both), Err(Status::PARAM));
    }

    #[test]
    fn test_access_control_rejects_conflicts() {
        let backend = MemoryBackend::new();
        let policy = AccessPolicy::with_protection(Protection::synchronizable(
            Availability::WhenPasscodeSet,
        ));
        assert_eq!(
            backend.create_access_control(&policy).err(),
            Some(Status::PARAM)
        );
        assert!(backend
            .create_access_control(&AccessPolicy::default())
            .is_ok());
    }

    #[test]
    fn test_gated_item_requires_context_when_ui_suppressed() {
        let backend = MemoryBackend::new();
        let policy = AccessPolicy::new(
            Protection::this_device_only(Availability::WhenUnlocked),
            CapabilitySet::all_of([Capability::BiometryCurrentSet]),
        );
        let handle = backend.create_access_control(&policy).unwrap();

        let mut item = password("alice", b"pw");
        item.insert(AttributeKey::ACCESS_CONTROL, Handle::Policy(handle));
        backend.add(&item).unwrap();

        let mut query = lookup("alice");
        query.insert(AttributeKey::AUTHENTICATION_UI, values::AUTHENTICATION_UI_FAIL);
        assert_eq!(
            backend.copy_matching(&query),
            Err(Status::INTERACTION_NOT_ALLOWED)
        );

        query.insert(
            AttributeKey::AUTHENTICATION_CONTEXT,
            Handle::AuthContext(AuthContext::new("evaluated")),
        );
        assert!(backend.copy_matching(&query).is_ok());
    }

    #[test]
    fn test_create_key_checks_length() {
        let backend = MemoryBackend::new();
        let mut attrs = AttributeMap::new();
        attrs.insert(AttributeKey::KEY_CLASS, KeyClass::Private.constant());
        attrs.insert(AttributeKey::KEY_TYPE, KeyType::EcSecPrimeRandom.constant());

        let mut material = vec![0x04];
        material.extend_from_slice(&[1u8; 96]);
        assert!(backend.create_key(&material, &attrs).is_ok());
        assert_eq!(
            backend.create_key(&material[..40], &attrs).err(),
            Some(Status::DECODE)
        );
    }

    #[test]
    fn test_non_extractable_keys_do_not_export() {
        let backend = MemoryBackend::with_non_extractable_keys();
        let mut attrs = AttributeMap::new();
        attrs.insert(AttributeKey::KEY_CLASS, KeyClass::Public.constant());
        attrs.insert(AttributeKey::KEY_TYPE, KeyType::EcSecPrimeRandom.constant());

        let mut material = vec![0x04];
        material.extend_from_slice(&[1u8; 64]);
        let key = backend.create_key(&material, &attrs).unwrap();
        assert!(backend.export_key(&key).is_none());
        assert!(backend.export_key(&KeyHandle::new(7u8)).is_none());
    }

    #[test]
    fn test_injected_failure_and_journal() {
        let backend = MemoryBackend::new();
        backend.inject_failure(Verb::Add, Status::NOT_AVAILABLE);
        assert_eq!(
            backend.add(&password("alice", b"pw")),
            Err(Status::NOT_AVAILABLE)
        );

        backend.clear_failures();
        backend.add(&password("alice", b"pw")).unwrap();

        let adds: Vec<_> = backend
            .requests()
            .into_iter()
            .filter(|r| r.verb == Verb::Add)
            .collect();
        assert_eq!(adds.len(), 2);
        assert_eq!(
            backend
                .last_request(Verb::Add)
                .unwrap()
                .attributes
                .get_str(&AttributeKey::ACCOUNT),
            Some("alice")
        );
    }

    #[test]
    fn test_describe_status() {
        let backend = MemoryBackend::new();
        assert!(backend
            .describe_status(Status::ITEM_NOT_FOUND)
            .unwrap()
            .contains("could not be found"));
        assert_eq!(backend.describe_status(Status(1234)), None);
    }
}
