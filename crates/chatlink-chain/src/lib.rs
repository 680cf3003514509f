//! chatlink Chain -- per-connection signing state.
//!
//! Each connection owns one encoder or decoder, one last-seen validator or
//! tracker, and one message validator per remote sender. None of these lock:
//! they are driven strictly in the order packets arrive on their connection.

pub mod chain;
pub mod clock;
pub mod last_seen;
pub mod message;
pub mod salt;
pub mod validator;

pub use chain::{
    ChainDecoder, ChainEncoder, MessageDecoder, MessageEncoder, RejectAllDecoder, UnsignedDecoder,
    UnsignedEncoder,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use last_seen::{LastSeenTracker, LastSeenValidator};
pub use message::ChatMessage;
pub use salt::{OsSalt, SaltSource, SeededSalt};
pub use validator::{AcceptUnsignedValidator, KeyBasedValidator, MessageValidator, RejectAllValidator};

use chatlink_protocol::ProtocolError;

/// Why an incoming signed message could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing profile key")]
    MissingKey,
    #[error("profile key has expired")]
    ExpiredKey,
    #[error("signature chain is broken")]
    ChainBroken,
    #[error("message arrived out of order")]
    OutOfOrder,
    #[error("invalid message signature")]
    InvalidSignature,
}

impl DecodeError {
    /// Whether this failure invalidates the rest of the session.
    pub fn breaks_chain(&self) -> bool {
        matches!(self, DecodeError::OutOfOrder | DecodeError::InvalidSignature)
    }

    /// Localization key for the reason shown to the user.
    pub fn translation_key(&self) -> &'static str {
        match self {
            DecodeError::MissingKey => "chat.disabled.missingProfileKey",
            DecodeError::ExpiredKey => "chat.disabled.expiredProfileKey",
            DecodeError::ChainBroken => "chat.disabled.chain_broken",
            DecodeError::OutOfOrder => "chat.disabled.out_of_order_chat",
            DecodeError::InvalidSignature => "chat.disabled.invalid_signature",
        }
    }
}

/// Misuse of the last-seen window by the acknowledging party.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("advanced last-seen window by {offset} (max {max})")]
    IllegalOffset { offset: i32, max: usize },
    #[error("acknowledged {len} slots in a window of {max}")]
    WindowTooLarge { len: usize, max: usize },
    #[error("acknowledged unknown or previously ignored message at index {index}")]
    UnknownAcknowledged { index: usize },
    #[error("update ignores previously acknowledged message at index {index}")]
    IgnoredAcknowledged { index: usize },
    #[error("last-seen checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("last-seen window of {window} slots (must be 1..={max})")]
    InvalidWindow { window: usize, max: usize },
}

impl ValidationError {
    pub fn translation_key(&self) -> &'static str {
        "multiplayer.disconnect.chat_validation_failed"
    }
}

/// Why a connection-level validator refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("chain already invalidated by an earlier message")]
    ChainInvalid,
    #[error("profile key has expired")]
    ExpiredKey,
    #[error("invalid message signature")]
    InvalidSignature,
    #[error("message is not a descendant of the last accepted message")]
    OutOfOrder,
    #[error("secure chat is enforced and no key is available")]
    SecureChatEnforced,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("system messages cannot carry a signature")]
    SignedSystemMessage,
    #[error("cannot resolve message: {0}")]
    Unpack(#[from] ProtocolError),
}
