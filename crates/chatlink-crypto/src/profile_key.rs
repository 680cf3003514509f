//! RSA profile keys -- PKCS#8 loading, signing, expiring public keys.

use chrono::{DateTime, Utc};
use ring::rand::SystemRandom;
use ring::signature::{self, KeyPair, RsaKeyPair, UnparsedPublicKey};
use std::path::Path;

use crate::{CryptoError, SignatureVerifier, Signer, SIGNATURE_LEN};

/// A sender's private profile key.
///
/// ring cannot generate RSA keys, so keys are provisioned out of band, e.g.
/// `openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048 | openssl pkcs8 -topk8 -nocrypt -outform der`.
pub struct ProfileKeyPair {
    keypair: RsaKeyPair,
    rng: SystemRandom,
}

impl ProfileKeyPair {
    /// Load keypair from PKCS#8 DER file.
    pub fn from_file(path: &Path) -> Result<Self, CryptoError> {
        let pkcs8_bytes = std::fs::read(path)?;
        Self::from_pkcs8_der(&pkcs8_bytes)
    }

    pub fn from_pkcs8_der(pkcs8_der: &[u8]) -> Result<Self, CryptoError> {
        let keypair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::KeyRejected(e.to_string()))?;

        // Signature length equals modulus length; the wire format fixes it.
        let modulus_len = keypair.public().modulus_len();
        if modulus_len != SIGNATURE_LEN {
            return Err(CryptoError::UnsupportedKeySize {
                bits: modulus_len * 8,
                expected: SIGNATURE_LEN * 8,
            });
        }

        Ok(Self {
            keypair,
            rng: SystemRandom::new(),
        })
    }

    /// DER-encoded RSAPublicKey.
    pub fn public_key_der(&self) -> &[u8] {
        self.keypair.public_key().as_ref()
    }

    /// Public half of this key, valid until `expires_at`.
    pub fn public_key(&self, expires_at: DateTime<Utc>) -> ProfilePublicKey {
        ProfilePublicKey::new(self.public_key_der().to_vec(), expires_at)
    }
}

impl Signer for ProfileKeyPair {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut signature = vec![0u8; self.keypair.public().modulus_len()];
        self.keypair
            .sign(&signature::RSA_PKCS1_SHA256, &self.rng, payload, &mut signature)
            .map_err(|_| CryptoError::SigningFailed)?;
        Ok(signature)
    }
}

impl std::fmt::Debug for ProfileKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileKeyPair")
            .field("fingerprint", &crate::key_fingerprint(self.public_key_der()))
            .finish_non_exhaustive()
    }
}

/// A sender's public profile key together with its expiry.
#[derive(Clone)]
pub struct ProfilePublicKey {
    key: UnparsedPublicKey<Vec<u8>>,
    expires_at: DateTime<Utc>,
}

impl ProfilePublicKey {
    pub fn new(public_key_der: Vec<u8>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, public_key_der),
            expires_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn der(&self) -> &[u8] {
        self.key.as_ref()
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn fingerprint(&self) -> String {
        crate::key_fingerprint(self.der())
    }
}

impl SignatureVerifier for ProfilePublicKey {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.key.verify(payload, signature).is_ok()
    }
}

impl std::fmt::Debug for ProfilePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilePublicKey")
            .field("fingerprint", &self.fingerprint())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
