//! Message signatures and their cache-packed wire form.

use bytes::{BufMut, Bytes, BytesMut};
use chatlink_crypto::{SignaturePayload, SignatureVerifier};

use crate::cache::SignatureCache;
use crate::codec::{self, Wire};
use crate::{ProtocolError, SIGNATURE_LEN};

/// A full message signature. Always exactly [`SIGNATURE_LEN`] bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wrap raw signature bytes.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidSignatureLength` unless `bytes` is
    /// exactly `SIGNATURE_LEN` long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let array: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidSignatureLength { len: bytes.len() })?;
        Ok(Self(array))
    }

    pub fn from_array(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn verify(&self, verifier: &impl SignatureVerifier, payload: &SignaturePayload) -> bool {
        verifier.verify(payload.as_bytes(), &self.0)
    }

    /// Order-sensitive rolling hash over the bytes (bytes read as signed).
    /// Feeds the last-seen checksum; not a cryptographic digest.
    pub fn checksum(&self) -> i32 {
        self.0.iter().fold(1i32, |acc, &byte| {
            acc.wrapping_mul(31).wrapping_add(byte as i8 as i32)
        })
    }

    pub fn pack(&self, cache: &SignatureCache) -> PackedSignature {
        match cache.pack(self) {
            Some(id) => PackedSignature::Cached(id),
            None => PackedSignature::Full(self.clone()),
        }
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 bytes are enough to tell signatures apart in logs
        write!(f, "Signature({}...)", hex::encode(&self.0[..8]))
    }
}

impl Wire for Signature {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.put_slice(&self.0);
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        codec::ensure(src, SIGNATURE_LEN)?;
        let raw = src.split_to(SIGNATURE_LEN);
        Self::from_bytes(&raw)
    }
}

/// A signature as transmitted: either a slot in the peer's cache mirror or
/// the full bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedSignature {
    Cached(usize),
    Full(Signature),
}

impl PackedSignature {
    /// Resolve against the local cache mirror.
    pub fn unpack(&self, cache: &SignatureCache) -> Result<Signature, ProtocolError> {
        match self {
            PackedSignature::Cached(id) => cache
                .unpack(*id)
                .cloned()
                .ok_or(ProtocolError::UnknownSignature { id: *id }),
            PackedSignature::Full(signature) => Ok(signature.clone()),
        }
    }
}

impl Wire for PackedSignature {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            PackedSignature::Cached(id) => codec::put_var_int(dst, *id as i32 + 1),
            PackedSignature::Full(signature) => {
                codec::put_var_int(dst, 0);
                signature.encode(dst)?;
            }
        }
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let tag = codec::get_len(src)?;
        if tag == 0 {
            Ok(PackedSignature::Full(Signature::decode(src)?))
        } else {
            Ok(PackedSignature::Cached(tag - 1))
        }
    }
}
