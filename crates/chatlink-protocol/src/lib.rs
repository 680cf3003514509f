//! chatlink Protocol -- signed chat wire types, signature cache, last-seen window.
//!
//! Everything a sender and a validator must encode bit-identically lives
//! here: signatures and their cache-packed form, message links and bodies,
//! the last-seen acknowledgement update, filter masks and the packets that
//! carry them. Integers are big-endian; lengths and small counters are
//! VarInts.

pub mod body;
pub mod cache;
pub mod codec;
pub mod content;
pub mod filter;
pub mod last_seen;
pub mod link;
pub mod messages;
pub mod params;
pub mod signature;

pub use body::{Body, PackedBody};
pub use cache::SignatureCache;
pub use codec::Wire;
pub use content::ChatContent;
pub use filter::{FilterBits, FilterMask};
pub use last_seen::{AcknowledgedSet, LastSeen, LastSeenUpdate, PackedLastSeen, IGNORE_CHECKSUM};
pub use link::Link;
pub use messages::*;
pub use params::{ProtocolParams, CURRENT_PARAMS, PARAMS_V1};
pub use signature::{PackedSignature, Signature};

/// Length of a full signature on the wire (sourced from current params).
pub const SIGNATURE_LEN: usize = PARAMS_V1.signature_len;

/// Signature cache slots per connection (sourced from current params).
pub const SIGNATURE_CACHE_SIZE: usize = PARAMS_V1.signature_cache_size;

/// Last-seen window size (sourced from current params).
pub const LAST_SEEN_WINDOW: usize = PARAMS_V1.last_seen_window;

/// Maximum signed content length in bytes (sourced from current params).
pub const MAX_MESSAGE_BYTES: usize = PARAMS_V1.max_message_bytes;

/// Maximum unsigned content length in bytes (sourced from current params).
pub const MAX_CONTENT_BYTES: usize = PARAMS_V1.max_content_bytes;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },
    #[error("varint too long")]
    VarIntTooLong,
    #[error("negative length or index: {0}")]
    Negative(i32),
    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },
    #[error("list too long: {len} entries (max {max})")]
    ListTooLong { len: usize, max: usize },
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("invalid signature length: {len} bytes (expected {SIGNATURE_LEN})")]
    InvalidSignatureLength { len: usize },
    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(i64),
    #[error("unknown {what} tag: {tag}")]
    UnknownTag { what: &'static str, tag: i32 },
    #[error("trailing bytes after message: {0}")]
    TrailingBytes(usize),
    #[error("signature {id} is unknown locally")]
    UnknownSignature { id: usize },
}
