//! Protocol parameters -- the versioned constants both peers must agree on.
//!
//! Window size, cache capacity and the signature version are baked into the
//! wire format: a peer using different values cannot decode our packets or
//! will desync its signature cache. Node-local policy (pending-message
//! limits, acknowledgement thresholds) lives in node configuration instead.

/// A named, versioned set of secure chat parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolParams {
    /// Version prefix mixed into every signed payload.
    pub message_signature_version: i32,

    // -- Signatures --
    /// Length in bytes of a full message signature.
    pub signature_len: usize,
    /// Number of slots in the per-connection signature cache.
    pub signature_cache_size: usize,

    // -- Last-seen window --
    /// Maximum number of acknowledged signatures carried in a body.
    /// Also the width of the acknowledgement bitset.
    pub last_seen_window: usize,

    // -- Content --
    /// Maximum UTF-8 length of signed message content.
    pub max_message_bytes: usize,
    /// Maximum UTF-8 length of unsigned (decorated) content.
    pub max_content_bytes: usize,

    // -- Expiry --
    /// Age after which a message is stale for the validating side.
    pub server_expiry_secs: i64,
    /// Age after which a message is stale for the displaying side.
    /// Longer than the server value to absorb relay latency.
    pub client_expiry_secs: i64,
}

impl ProtocolParams {
    /// Bytes needed for the fixed acknowledgement bitset.
    pub const fn acknowledged_bytes(&self) -> usize {
        self.last_seen_window.div_ceil(8)
    }
}

/// Version 1 parameters.
pub const PARAMS_V1: ProtocolParams = ProtocolParams {
    message_signature_version: 1,

    // Signatures: RSA-2048
    signature_len: 256,
    signature_cache_size: 128,

    // Last-seen window
    last_seen_window: 20,

    // Content
    max_message_bytes: 256,
    max_content_bytes: 262_144,

    // Expiry: server 5 min, client +2 min
    server_expiry_secs: 5 * 60,
    client_expiry_secs: 7 * 60,
};

/// The active parameter set.
pub const CURRENT_PARAMS: &ProtocolParams = &PARAMS_V1;
