//! Shared fixtures for the integration test binaries.

use std::sync::Arc;

use keysmith_keychain::{Keychain, MemoryBackend};

/// A fresh backend and an unscoped store over it.
pub fn memory_keychain() -> (Arc<MemoryBackend>, Keychain<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    (backend.clone(), Keychain::new(backend))
}

/// A deterministic P-256 private key.
pub fn signing_key(seed: u8) -> p256::SecretKey {
    let mut scalar = [seed; 32];
    scalar[0] = 0x01;
    p256::SecretKey::from_slice(&scalar).unwrap_or_else(|_| panic!("invalid test scalar {seed}"))
}
