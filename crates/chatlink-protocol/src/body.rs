//! Message bodies -- the canonical signable fields of a chat message.

use bytes::{BufMut, Bytes, BytesMut};
use chatlink_crypto::SignaturePayload;
use chrono::{DateTime, Utc};

use crate::cache::SignatureCache;
use crate::codec::{self, Wire};
use crate::last_seen::{LastSeen, PackedLastSeen};
use crate::{ProtocolError, MAX_MESSAGE_BYTES};

/// Content, timestamp, salt and the sender's last-seen list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    content: String,
    timestamp: DateTime<Utc>,
    salt: i64,
    last_seen: LastSeen,
}

impl Body {
    pub fn new(content: String, timestamp: DateTime<Utc>, salt: i64, last_seen: LastSeen) -> Self {
        Self {
            content,
            timestamp,
            salt,
            last_seen,
        }
    }

    /// Body for a message that will never be verified.
    pub fn unsigned(content: String, now: DateTime<Utc>) -> Self {
        Self::new(content, now, 0, LastSeen::empty())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn salt(&self) -> i64 {
        self.salt
    }

    pub fn last_seen(&self) -> &LastSeen {
        &self.last_seen
    }

    /// Signed form: salt, timestamp in whole seconds, length-prefixed
    /// content, then the last-seen list.
    pub fn update_signature(&self, payload: &mut SignaturePayload) {
        payload.update_i64(self.salt);
        payload.update_i64(self.timestamp.timestamp());
        payload.update_i32(self.content.len() as i32);
        payload.update(self.content.as_bytes());
        self.last_seen.update_signature(payload);
    }

    pub fn pack(&self, cache: &SignatureCache) -> PackedBody {
        PackedBody {
            content: self.content.clone(),
            timestamp: self.timestamp,
            salt: self.salt,
            last_seen: self.last_seen.pack(cache),
        }
    }
}

/// Body as transmitted, with a cache-packed last-seen list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBody {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub salt: i64,
    pub last_seen: PackedLastSeen,
}

impl PackedBody {
    pub fn unpack(&self, cache: &SignatureCache) -> Result<Body, ProtocolError> {
        let last_seen = self.last_seen.unpack(cache)?;
        Ok(Body::new(
            self.content.clone(),
            self.timestamp,
            self.salt,
            last_seen,
        ))
    }
}

impl Wire for PackedBody {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_string(dst, &self.content, MAX_MESSAGE_BYTES)?;
        codec::put_timestamp(dst, &self.timestamp);
        dst.put_i64(self.salt);
        self.last_seen.encode(dst)
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            content: codec::get_string(src, MAX_MESSAGE_BYTES)?,
            timestamp: codec::get_timestamp(src)?,
            salt: codec::get_i64(src)?,
            last_seen: PackedLastSeen::decode(src)?,
        })
    }
}
