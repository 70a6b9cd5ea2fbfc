//! End-to-end store/retrieve/remove scenarios over the memory backend.

use keysmith_integration_tests::{memory_keychain, signing_key};
use keysmith_keychain::{
    CryptoKey, GenericPassword, InternetPassword, MatchLimit, Protocol, Query, StoreError,
    SymmetricKey, SymmetricKeySize,
};

#[test]
fn test_alice_generic_password() {
    let (_, keychain) = memory_keychain();
    let query = Query::<GenericPassword>::new().account("alice");

    keychain.store(&vec![1u8, 2], &query).unwrap();
    let value: Option<Vec<u8>> = keychain.retrieve(&query).unwrap();
    assert_eq!(value, Some(vec![1, 2]));

    assert!(keychain.remove(&query).unwrap());
    let value: Option<Vec<u8>> = keychain.retrieve(&query).unwrap();
    assert_eq!(value, None);
    assert!(!keychain.remove(&query).unwrap());
}

#[test]
fn test_internet_password_with_full_identity() {
    let (_, keychain) = memory_keychain();
    let query = Query::<InternetPassword>::new()
        .account("alice")
        .server("mail.example.com")
        .protocol(Protocol::Imaps)
        .port(993)
        .label("Work mail");

    keychain.store(&"s3cret".to_string(), &query).unwrap();
    let value: Option<String> = keychain.retrieve(&query).unwrap();
    assert_eq!(value.as_deref(), Some("s3cret"));

    let err = keychain.store(&"other".to_string(), &query).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateItem));
}

#[test]
fn test_private_and_public_halves_coexist() {
    let (backend, keychain) = memory_keychain();
    let tag = b"com.example.device-identity".to_vec();
    let private = signing_key(3);

    keychain
        .store(&private, &Query::<CryptoKey>::new().application_tag(tag.clone()))
        .unwrap();
    keychain
        .store(
            &private.public_key(),
            &Query::<CryptoKey>::new().application_tag(tag.clone()),
        )
        .unwrap();
    assert_eq!(backend.item_count(), 2);

    let restored: Option<p256::SecretKey> = keychain
        .retrieve(
            &Query::<CryptoKey>::new()
                .application_tag(tag.clone())
                .key_class(keysmith_keychain::KeyClass::Private),
        )
        .unwrap();
    assert_eq!(restored, Some(private.clone()));

    let restored: Option<p256::PublicKey> = keychain
        .retrieve(
            &Query::<CryptoKey>::new()
                .application_tag(tag.clone())
                .key_class(keysmith_keychain::KeyClass::Public),
        )
        .unwrap();
    assert_eq!(restored, Some(private.public_key()));

    // The requested type alone picks the right half.
    let by_tag = Query::<CryptoKey>::new().application_tag(tag);
    let restored: Option<p256::PublicKey> = keychain.retrieve(&by_tag).unwrap();
    assert_eq!(restored, Some(private.public_key()));
    let restored: Option<p256::SecretKey> = keychain.retrieve(&by_tag).unwrap();
    assert_eq!(restored, Some(private));
}

#[test]
fn test_symmetric_key_survives_roundtrip() {
    let (_, keychain) = memory_keychain();
    let query = Query::<GenericPassword>::new()
        .service("com.example.vault")
        .account("wrapping-key");
    let key = SymmetricKey::generate(SymmetricKeySize::Bits128);

    keychain.store(&key, &query).unwrap();
    let restored: Option<SymmetricKey> = keychain
        .retrieve(&query.clone().match_limit(MatchLimit::All))
        .unwrap();
    assert_eq!(restored.map(|k| k.fingerprint()), Some(key.fingerprint()));
}

#[test]
fn test_enumerate_lists_without_secrets() {
    let (_, keychain) = memory_keychain();
    for account in ["alice", "bob", "carol"] {
        keychain
            .store(
                &account.to_string(),
                &Query::<GenericPassword>::new()
                    .service("com.example.app")
                    .account(account),
            )
            .unwrap();
    }

    let items = keychain
        .enumerate(&Query::<GenericPassword>::new().service("com.example.app"))
        .unwrap();
    let mut accounts: Vec<_> = items
        .iter()
        .filter_map(|item| item.get_str(&keysmith_keychain::AttributeKey::ACCOUNT))
        .collect();
    accounts.sort_unstable();
    assert_eq!(accounts, ["alice", "bob", "carol"]);
    assert!(items
        .iter()
        .all(|item| !item.contains_key(&keysmith_keychain::AttributeKey::VALUE_DATA)));
}
