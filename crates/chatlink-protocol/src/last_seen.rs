//! Last-seen lists and the compact acknowledgement update.

use bytes::{BufMut, Bytes, BytesMut};
use chatlink_crypto::SignaturePayload;

use crate::cache::SignatureCache;
use crate::codec::{self, Wire};
use crate::signature::{PackedSignature, Signature};
use crate::{ProtocolError, LAST_SEEN_WINDOW, PARAMS_V1};

/// Checksum value meaning "do not verify".
pub const IGNORE_CHECKSUM: u8 = 0;

/// Signatures of messages from the other party that a sender had seen when
/// composing a message. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastSeen {
    entries: Vec<Signature>,
}

impl LastSeen {
    pub fn new(entries: Vec<Signature>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Signature] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Desync detector over the whole list. Never returns [`IGNORE_CHECKSUM`].
    pub fn checksum(&self) -> u8 {
        let folded = self.entries.iter().fold(1i32, |acc, signature| {
            acc.wrapping_mul(31).wrapping_add(signature.checksum())
        });
        match folded as u8 {
            IGNORE_CHECKSUM => 1,
            byte => byte,
        }
    }

    pub fn update_signature(&self, payload: &mut SignaturePayload) {
        payload.update_i32(self.entries.len() as i32);
        for signature in &self.entries {
            payload.update(signature.as_bytes());
        }
    }

    pub fn pack(&self, cache: &SignatureCache) -> PackedLastSeen {
        PackedLastSeen {
            entries: self.entries.iter().map(|s| s.pack(cache)).collect(),
        }
    }
}

/// Last-seen list with cache-packed signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedLastSeen {
    pub entries: Vec<PackedSignature>,
}

impl PackedLastSeen {
    pub fn unpack(&self, cache: &SignatureCache) -> Result<LastSeen, ProtocolError> {
        let entries = self
            .entries
            .iter()
            .map(|packed| packed.unpack(cache))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LastSeen::new(entries))
    }
}

impl Wire for PackedLastSeen {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.entries.len() > LAST_SEEN_WINDOW {
            return Err(ProtocolError::ListTooLong {
                len: self.entries.len(),
                max: LAST_SEEN_WINDOW,
            });
        }
        codec::put_len(dst, self.entries.len());
        for entry in &self.entries {
            entry.encode(dst)?;
        }
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let len = codec::get_len(src)?;
        if len > LAST_SEEN_WINDOW {
            return Err(ProtocolError::ListTooLong {
                len,
                max: LAST_SEEN_WINDOW,
            });
        }
        let entries = (0..len)
            .map(|_| PackedSignature::decode(src))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

/// Bitset of acknowledged window slots. Slot 0 is the oldest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AcknowledgedSet(u32);

impl AcknowledgedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Slots past the bitset width are ignored.
    pub fn set(&mut self, index: usize) {
        if let Some(bit) = u32::try_from(index).ok().and_then(|i| 1u32.checked_shl(i)) {
            self.0 |= bit;
        }
    }

    pub fn get(&self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    /// One past the highest set slot, zero when empty.
    pub fn len(&self) -> usize {
        (u32::BITS - self.0.leading_zeros()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }
}

/// Compact acknowledgement: drop `offset` oldest tracked slots, then confirm
/// the marked slots of the remaining window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSeenUpdate {
    pub offset: i32,
    pub acknowledged: AcknowledgedSet,
    pub checksum: u8,
}

impl LastSeenUpdate {
    pub fn empty() -> Self {
        Self {
            offset: 0,
            acknowledged: AcknowledgedSet::new(),
            checksum: IGNORE_CHECKSUM,
        }
    }

    pub fn verify_checksum(&self, last_seen: &LastSeen) -> bool {
        self.checksum == IGNORE_CHECKSUM || self.checksum == last_seen.checksum()
    }
}

impl Wire for LastSeenUpdate {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_var_int(dst, self.offset);
        codec::put_fixed_bits(dst, self.acknowledged.bits(), PARAMS_V1.acknowledged_bytes());
        dst.put_u8(self.checksum);
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let offset = codec::get_var_int(src)?;
        let bits = codec::get_fixed_bits(src, PARAMS_V1.acknowledged_bytes())?;
        let checksum = codec::get_u8(src)?;
        Ok(Self {
            offset,
            acknowledged: AcknowledgedSet::from_bits(bits),
            checksum,
        })
    }
}
