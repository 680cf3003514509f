//! chatlink Crypto -- the opaque sign/verify seam and RSA profile keys.
//!
//! Everything above this crate treats signing as `bytes -> signature` and
//! verification as `(bytes, signature) -> bool`. The canonical bytes are
//! assembled with [`SignaturePayload`].
//!
//! Profile keys are RSA-2048 with PKCS#1 v1.5 padding over SHA-256, which
//! yields the fixed 256-byte signatures carried on the wire.

use sha2::{Digest, Sha256};

pub mod profile_key;

// Re-exports
pub use profile_key::{ProfileKeyPair, ProfilePublicKey};

/// Length of every message signature produced by a profile key.
pub const SIGNATURE_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key rejected: {0}")]
    KeyRejected(String),
    #[error("unsupported key size: {bits} bits (expected {expected})")]
    UnsupportedKeySize { bits: usize, expected: usize },
    #[error("signing failed")]
    SigningFailed,
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Produces signatures over canonical payload bytes.
pub trait Signer {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Checks signatures over canonical payload bytes.
pub trait SignatureVerifier {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        (**self).sign(payload)
    }
}

impl<T: SignatureVerifier + ?Sized> SignatureVerifier for &T {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        (**self).verify(payload, signature)
    }
}

/// Canonical byte sequence fed to a signer or verifier.
///
/// Integers are appended big-endian. Callers append fields in a fixed order,
/// so the same logical fields always produce the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignaturePayload {
    bytes: Vec<u8>,
}

impl SignaturePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn update_i32(&mut self, value: i32) {
        self.update(&value.to_be_bytes());
    }

    pub fn update_i64(&mut self, value: i64) {
        self.update(&value.to_be_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// SHA-256 fingerprint of a public key, as a hex string.
pub fn key_fingerprint(public_key_der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key_der);
    hex::encode(hasher.finalize())
}
