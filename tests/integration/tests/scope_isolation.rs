//! Stores scoped to different access groups never see each other's items.

use std::sync::Arc;

use keysmith_keychain::{GenericPassword, Keychain, MemoryBackend, Query, Synchronizable};

fn scoped(backend: &Arc<MemoryBackend>, group: &str) -> Keychain<MemoryBackend> {
    Keychain::with_access_group(backend.clone(), group)
}

#[test]
fn test_same_identity_in_two_groups() {
    let backend = Arc::new(MemoryBackend::new());
    let app = scoped(&backend, "ABCDE12345.com.example.app");
    let share = scoped(&backend, "ABCDE12345.com.example.share");
    let query = Query::<GenericPassword>::new().account("alice");

    app.store(&"app".to_string(), &query).unwrap();
    share.store(&"share".to_string(), &query).unwrap();

    let from_app: Option<String> = app.retrieve(&query).unwrap();
    let from_share: Option<String> = share.retrieve(&query).unwrap();
    assert_eq!(from_app.as_deref(), Some("app"));
    assert_eq!(from_share.as_deref(), Some("share"));

    assert!(app.remove(&query).unwrap());
    let from_share: Option<String> = share.retrieve(&query).unwrap();
    assert_eq!(from_share.as_deref(), Some("share"));
}

#[test]
fn test_unscoped_store_does_not_see_scoped_items() {
    let backend = Arc::new(MemoryBackend::new());
    let app = scoped(&backend, "group.com.example.app");
    let unscoped = Keychain::new(backend.clone());
    let query = Query::<GenericPassword>::new().account("alice");

    app.store(&vec![1u8], &query).unwrap();
    assert!(!unscoped.contains(&query).unwrap());

    unscoped.remove_all().unwrap();
    assert!(app.contains(&query).unwrap());
}

#[test]
fn test_synchronizable_items_need_explicit_match() {
    let (_, keychain) = keysmith_integration_tests::memory_keychain();
    let synced = Query::<GenericPassword>::new()
        .account("alice")
        .synchronizable(Synchronizable::Yes);

    keychain.store(&vec![1u8], &synced).unwrap();

    let plain = Query::<GenericPassword>::new().account("alice");
    let value: Option<Vec<u8>> = keychain.retrieve(&plain).unwrap();
    assert!(value.is_none());

    let any = plain.synchronizable(Synchronizable::Any);
    let value: Option<Vec<u8>> = keychain.retrieve(&any).unwrap();
    assert_eq!(value, Some(vec![1]));
}
