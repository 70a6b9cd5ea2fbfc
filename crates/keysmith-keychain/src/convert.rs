//! Conversion contracts between domain values and stored representations.
//!
//! Passwords and symmetric keys are [`ByteConvertible`]: they round-trip
//! through an opaque byte buffer. Asymmetric keys are [`KeyConvertible`]:
//! they round-trip through the ANSI X9.63 representation the backend uses to
//! build and export native key objects.

use std::fmt;

use keysmith_core::{SecretBytes, SecretString};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A representation could not be parsed into the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConversionError(String);

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A value stored as a raw byte buffer.
pub trait ByteConvertible: Sized {
    /// The bytes written to the backend.
    fn raw_representation(&self) -> SecretBytes;

    /// Rebuild the value from bytes read back from the backend.
    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError>;
}

/// Backend key class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    Public,
    Private,
    Symmetric,
}

impl KeyClass {
    pub fn constant(&self) -> &'static str {
        match self {
            KeyClass::Public => "0",
            KeyClass::Private => "1",
            KeyClass::Symmetric => "2",
        }
    }

    pub fn from_constant(value: &str) -> Option<Self> {
        match value {
            "0" => Some(KeyClass::Public),
            "1" => Some(KeyClass::Private),
            "2" => Some(KeyClass::Symmetric),
            _ => None,
        }
    }
}

/// Backend key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Elliptic curve over a NIST prime field.
    EcSecPrimeRandom,
}

impl KeyType {
    pub fn constant(&self) -> &'static str {
        match self {
            KeyType::EcSecPrimeRandom => "73",
        }
    }

    pub fn from_constant(value: &str) -> Option<Self> {
        match value {
            "73" => Some(KeyType::EcSecPrimeRandom),
            _ => None,
        }
    }
}

/// A key stored as a backend-native key object.
pub trait KeyConvertible: Sized {
    const KEY_CLASS: KeyClass;
    const KEY_TYPE: KeyType;
    const KEY_SIZE_IN_BITS: u32;

    /// ANSI X9.63 representation: `04 || X || Y` for public keys, followed by
    /// `|| K` for private keys.
    fn x963_representation(&self) -> SecretBytes;

    fn from_x963_representation(bytes: &[u8]) -> Result<Self, ConversionError>;
}

impl ByteConvertible for Vec<u8> {
    fn raw_representation(&self) -> SecretBytes {
        SecretBytes::new(self.clone())
    }

    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        Ok(bytes.to_vec())
    }
}

impl ByteConvertible for SecretBytes {
    fn raw_representation(&self) -> SecretBytes {
        self.clone()
    }

    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        Ok(SecretBytes::from(bytes))
    }
}

impl ByteConvertible for String {
    fn raw_representation(&self) -> SecretBytes {
        SecretBytes::new(self.as_bytes())
    }

    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ConversionError::new(format!("not valid UTF-8: {e}")))
    }
}

impl ByteConvertible for SecretString {
    fn raw_representation(&self) -> SecretBytes {
        SecretBytes::new(self.expose_secret().as_bytes())
    }

    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ConversionError::new(format!("not valid UTF-8: {e}")))?;
        Ok(SecretString::new(text))
    }
}

/// Symmetric key size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetricKeySize {
    Bits128,
    Bits192,
    Bits256,
}

impl SymmetricKeySize {
    pub fn byte_count(&self) -> usize {
        match self {
            SymmetricKeySize::Bits128 => 16,
            SymmetricKeySize::Bits192 => 24,
            SymmetricKeySize::Bits256 => 32,
        }
    }

    fn from_byte_count(count: usize) -> Option<Self> {
        match count {
            16 => Some(SymmetricKeySize::Bits128),
            24 => Some(SymmetricKeySize::Bits192),
            32 => Some(SymmetricKeySize::Bits256),
            _ => None,
        }
    }
}

/// A symmetric key, stored as a generic password.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    bytes: SecretBytes,
}

impl SymmetricKey {
    /// Wrap existing key material. Only 128, 192 and 256-bit keys are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
        if SymmetricKeySize::from_byte_count(bytes.len()).is_none() {
            return Err(ConversionError::new(format!(
                "symmetric key must be 16, 24 or 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: SecretBytes::from(bytes),
        })
    }

    /// Generate a fresh random key.
    pub fn generate(size: SymmetricKeySize) -> Self {
        let mut bytes = vec![0u8; size.byte_count()];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            bytes: SecretBytes::new(bytes),
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn expose_secret(&self) -> &[u8] {
        self.bytes.expose_secret()
    }

    /// First 8 bytes of the SHA-256 of the key, hex-encoded. Safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes.expose_secret());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bits", &self.bit_count())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl ByteConvertible for SymmetricKey {
    fn raw_representation(&self) -> SecretBytes {
        self.bytes.clone()
    }

    fn from_raw_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        Self::from_bytes(bytes)
    }
}

/// Length of an uncompressed P-256 point.
const P256_POINT_LEN: usize = 65;
/// Length of a P-256 scalar.
const P256_SCALAR_LEN: usize = 32;

impl KeyConvertible for p256::PublicKey {
    const KEY_CLASS: KeyClass = KeyClass::Public;
    const KEY_TYPE: KeyType = KeyType::EcSecPrimeRandom;
    const KEY_SIZE_IN_BITS: u32 = 256;

    fn x963_representation(&self) -> SecretBytes {
        SecretBytes::new(self.to_encoded_point(false).as_bytes())
    }

    fn from_x963_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        if bytes.len() != P256_POINT_LEN || bytes[0] != 0x04 {
            return Err(ConversionError::new(format!(
                "expected a {P256_POINT_LEN}-byte uncompressed P-256 point, got {} bytes",
                bytes.len()
            )));
        }
        p256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| ConversionError::new("point is not on the P-256 curve"))
    }
}

impl KeyConvertible for p256::SecretKey {
    const KEY_CLASS: KeyClass = KeyClass::Private;
    const KEY_TYPE: KeyType = KeyType::EcSecPrimeRandom;
    const KEY_SIZE_IN_BITS: u32 = 256;

    fn x963_representation(&self) -> SecretBytes {
        let point = self.public_key().to_encoded_point(false);
        let scalar = self.to_bytes();

        let mut bytes = Vec::with_capacity(P256_POINT_LEN + P256_SCALAR_LEN);
        bytes.extend_from_slice(point.as_bytes());
        bytes.extend_from_slice(&scalar);
        SecretBytes::new(bytes)
    }

    fn from_x963_representation(bytes: &[u8]) -> Result<Self, ConversionError> {
        if bytes.len() != P256_POINT_LEN + P256_SCALAR_LEN || bytes[0] != 0x04 {
            return Err(ConversionError::new(format!(
                "expected a {}-byte P-256 private key, got {} bytes",
                P256_POINT_LEN + P256_SCALAR_LEN,
                bytes.len()
            )));
        }

        let (point, scalar) = bytes.split_at(P256_POINT_LEN);
        let secret = p256::SecretKey::from_slice(scalar)
            .map_err(|_| ConversionError::new("scalar is not a valid P-256 private key"))?;
        let public = p256::PublicKey::from_sec1_bytes(point)
            .map_err(|_| ConversionError::new("point is not on the P-256 curve"))?;

        if secret.public_key() != public {
            return Err(ConversionError::new(
                "public point does not match the private scalar",
            ));
        }
        Ok(secret)
    }
}
