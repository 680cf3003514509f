//! Signature chain encoders and decoders.
//!
//! An encoder signs each outgoing body against the next link of its session
//! and advances. A decoder expects exactly that sequence back: the first
//! reordered or forged message breaks the chain for good, and only a new
//! decoder (a new session) restores trust.

use chatlink_crypto::{ProfilePublicKey, Signer};
use chatlink_protocol::{Body, FilterMask, Link, Signature};
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::message::ChatMessage;
use crate::DecodeError;

/// Signs outgoing bodies.
pub trait MessageEncoder {
    /// Signature for `body`, or `None` if the message goes out unsigned.
    fn encode(&mut self, body: &Body) -> Option<Signature>;
}

/// Turns an incoming (signature, body) pair into a trusted message.
pub trait MessageDecoder {
    fn decode(&mut self, signature: Option<Signature>, body: Body) -> Result<ChatMessage, DecodeError>;
}

// ============================================================================
// Encoders
// ============================================================================

pub struct ChainEncoder<S> {
    signer: S,
    next_link: Option<Link>,
}

impl<S: Signer> ChainEncoder<S> {
    /// Encoder for a fresh session, starting at index 0.
    pub fn new(signer: S, sender: Uuid, session: Uuid) -> Self {
        Self::resume(signer, Link::root(sender, session))
    }

    pub fn resume(signer: S, next_link: Link) -> Self {
        Self {
            signer,
            next_link: Some(next_link),
        }
    }

    pub fn next_link(&self) -> Option<&Link> {
        self.next_link.as_ref()
    }
}

impl<S: Signer> MessageEncoder for ChainEncoder<S> {
    fn encode(&mut self, body: &Body) -> Option<Signature> {
        let link = self.next_link?;
        let payload = ChatMessage::signed_payload(&link, body);
        let signed = self
            .signer
            .sign(payload.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|bytes| Signature::from_bytes(&bytes).map_err(|e| e.to_string()));

        match signed {
            Ok(signature) => {
                self.next_link = link.advance();
                debug!(
                    sender = %link.sender(),
                    session = %link.session(),
                    index = link.index(),
                    "signed message"
                );
                Some(signature)
            }
            Err(e) => {
                error!(sender = %link.sender(), index = link.index(), "failed to sign message: {e}");
                None
            }
        }
    }
}

/// Never signs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedEncoder;

impl MessageEncoder for UnsignedEncoder {
    fn encode(&mut self, _body: &Body) -> Option<Signature> {
        None
    }
}

// ============================================================================
// Decoders
// ============================================================================

pub struct ChainDecoder<C> {
    key: ProfilePublicKey,
    clock: C,
    next_link: Option<Link>,
    last_timestamp: DateTime<Utc>,
}

impl<C: Clock> ChainDecoder<C> {
    /// Decoder for a fresh session, expecting index 0 first.
    pub fn new(key: ProfilePublicKey, sender: Uuid, session: Uuid, clock: C) -> Self {
        Self::resume(key, Link::root(sender, session), clock)
    }

    pub fn resume(key: ProfilePublicKey, next_link: Link, clock: C) -> Self {
        Self {
            key,
            clock,
            next_link: Some(next_link),
            last_timestamp: DateTime::UNIX_EPOCH,
        }
    }

    pub fn next_link(&self) -> Option<&Link> {
        self.next_link.as_ref()
    }

    pub fn is_broken(&self) -> bool {
        self.next_link.is_none()
    }

    fn break_chain(&mut self, reason: DecodeError) -> DecodeError {
        if let Some(link) = self.next_link.take() {
            warn!(
                sender = %link.sender(),
                session = %link.session(),
                index = link.index(),
                "signature chain broken: {reason}"
            );
        }
        reason
    }
}

impl<C: Clock> MessageDecoder for ChainDecoder<C> {
    fn decode(&mut self, signature: Option<Signature>, body: Body) -> Result<ChatMessage, DecodeError> {
        let Some(signature) = signature else {
            return Err(DecodeError::MissingKey);
        };

        let now = self.clock.now();
        if self.key.has_expired(now) {
            return Err(DecodeError::ExpiredKey);
        }

        let Some(link) = self.next_link else {
            return Err(DecodeError::ChainBroken);
        };

        if body.timestamp() < self.last_timestamp {
            return Err(self.break_chain(DecodeError::OutOfOrder));
        }

        // A system sender can never hold a key, so treat its signature as forged
        let message = match ChatMessage::new(link, Some(signature), body, None, FilterMask::PassThrough) {
            Ok(message) if message.verify(&self.key) => message,
            _ => return Err(self.break_chain(DecodeError::InvalidSignature)),
        };

        self.last_timestamp = message.timestamp();
        self.next_link = link.advance();

        if message.has_expired_server(now) {
            warn!(
                sender = %link.sender(),
                index = link.index(),
                timestamp = %message.timestamp(),
                "received expired chat message"
            );
        }

        Ok(message)
    }
}

/// Refuses everything, for senders with no session key.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllDecoder;

impl MessageDecoder for RejectAllDecoder {
    fn decode(&mut self, _signature: Option<Signature>, _body: Body) -> Result<ChatMessage, DecodeError> {
        Err(DecodeError::MissingKey)
    }
}

/// Accepts messages as unsigned unless secure chat is enforced.
pub struct UnsignedDecoder<C> {
    sender: Uuid,
    enforce_secure_chat: bool,
    clock: C,
}

impl<C: Clock> UnsignedDecoder<C> {
    pub fn new(sender: Uuid, enforce_secure_chat: bool, clock: C) -> Self {
        Self {
            sender,
            enforce_secure_chat,
            clock,
        }
    }
}

impl<C: Clock> MessageDecoder for UnsignedDecoder<C> {
    fn decode(&mut self, _signature: Option<Signature>, body: Body) -> Result<ChatMessage, DecodeError> {
        if self.enforce_secure_chat {
            return Err(DecodeError::MissingKey);
        }
        Ok(ChatMessage::unsigned(
            self.sender,
            body.content(),
            self.clock.now(),
        ))
    }
}
