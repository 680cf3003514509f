//! Wire packets exchanged between a signing party and its validator.
//!
//! Framing (length prefixes, connection multiplexing) is the transport's
//! business; these types only define the payload bytes.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::codec::{self, Wire};
use crate::content::ChatContent;
use crate::{
    Body, FilterMask, LastSeen, LastSeenUpdate, Link, PackedBody, PackedSignature, ProtocolError,
    Signature, MAX_MESSAGE_BYTES,
};

// ============================================================================
// Submission (signing party -> validator)
// ============================================================================

/// A chat message as composed by its sender. The last-seen list travels as
/// an update against the validator's own window, not as signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSubmission {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub salt: i64,
    pub signature: Option<Signature>,
    pub last_seen: LastSeenUpdate,
}

impl ChatSubmission {
    /// Rebuild the signed body once the validator has resolved the update.
    pub fn body(&self, last_seen: LastSeen) -> Body {
        Body::new(self.content.clone(), self.timestamp, self.salt, last_seen)
    }
}

impl Wire for ChatSubmission {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_string(dst, &self.content, MAX_MESSAGE_BYTES)?;
        codec::put_timestamp(dst, &self.timestamp);
        dst.put_i64(self.salt);
        codec::put_bool(dst, self.signature.is_some());
        if let Some(signature) = &self.signature {
            signature.encode(dst)?;
        }
        self.last_seen.encode(dst)
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let content = codec::get_string(src, MAX_MESSAGE_BYTES)?;
        let timestamp = codec::get_timestamp(src)?;
        let salt = codec::get_i64(src)?;
        let signature = if codec::get_bool(src)? {
            Some(Signature::decode(src)?)
        } else {
            None
        };
        let last_seen = LastSeenUpdate::decode(src)?;
        Ok(Self {
            content,
            timestamp,
            salt,
            signature,
            last_seen,
        })
    }
}

// ============================================================================
// Broadcast (validator -> recipient)
// ============================================================================

/// A verified message relayed to a recipient, packed against that
/// recipient's signature cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBroadcast {
    pub link: Link,
    pub signature: Option<PackedSignature>,
    pub body: PackedBody,
    pub unsigned_content: Option<ChatContent>,
    pub filter_mask: FilterMask,
}

impl Wire for ChatBroadcast {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        self.link.encode(dst)?;
        codec::put_bool(dst, self.signature.is_some());
        if let Some(signature) = &self.signature {
            signature.encode(dst)?;
        }
        self.body.encode(dst)?;
        codec::put_bool(dst, self.unsigned_content.is_some());
        if let Some(content) = &self.unsigned_content {
            content.encode(dst)?;
        }
        self.filter_mask.encode(dst)
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let link = Link::decode(src)?;
        let signature = if codec::get_bool(src)? {
            Some(PackedSignature::decode(src)?)
        } else {
            None
        };
        let body = PackedBody::decode(src)?;
        let unsigned_content = if codec::get_bool(src)? {
            Some(ChatContent::decode(src)?)
        } else {
            None
        };
        let filter_mask = FilterMask::decode(src)?;
        Ok(Self {
            link,
            signature,
            body,
            unsigned_content,
            filter_mask,
        })
    }
}

// ============================================================================
// Acknowledgement (signing party -> validator)
// ============================================================================

/// Advance the validator's window without sending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatAck {
    pub offset: i32,
}

impl Wire for ChatAck {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_var_int(dst, self.offset);
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            offset: codec::get_var_int(src)?,
        })
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Any chat packet, tagged with a leading VarInt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFrame {
    Submission(ChatSubmission),
    Broadcast(ChatBroadcast),
    Ack(ChatAck),
}

impl ChatFrame {
    const SUBMISSION_TAG: i32 = 0;
    const BROADCAST_TAG: i32 = 1;
    const ACK_TAG: i32 = 2;
}

impl Wire for ChatFrame {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            ChatFrame::Submission(submission) => {
                codec::put_var_int(dst, Self::SUBMISSION_TAG);
                submission.encode(dst)
            }
            ChatFrame::Broadcast(broadcast) => {
                codec::put_var_int(dst, Self::BROADCAST_TAG);
                broadcast.encode(dst)
            }
            ChatFrame::Ack(ack) => {
                codec::put_var_int(dst, Self::ACK_TAG);
                ack.encode(dst)
            }
        }
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        match codec::get_var_int(src)? {
            Self::SUBMISSION_TAG => Ok(ChatFrame::Submission(ChatSubmission::decode(src)?)),
            Self::BROADCAST_TAG => Ok(ChatFrame::Broadcast(ChatBroadcast::decode(src)?)),
            Self::ACK_TAG => Ok(ChatFrame::Ack(ChatAck::decode(src)?)),
            tag => Err(ProtocolError::UnknownTag {
                what: "chat frame",
                tag,
            }),
        }
    }
}
