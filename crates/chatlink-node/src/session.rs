//! Per-connection chat sessions.
//!
//! A [`SenderSession`] is the signing party's end of a connection: it
//! composes signed submissions and receives broadcasts from every sender in
//! the room. A [`ReceiverSession`] is the validating party's end of the same
//! connection: it decodes submissions and packs broadcasts for it. Each
//! side keeps its own mirror of the signature cache and its half of the
//! last-seen window, so both must see packets in the same order.

use std::collections::HashMap;

use chatlink_chain::{
    AcceptUnsignedValidator, ChainDecoder, ChatMessage, Clock, DecodeError, KeyBasedValidator,
    LastSeenTracker, LastSeenValidator, MessageDecoder, MessageEncoder, MessageError,
    MessageValidator, RejectAllDecoder, RejectAllValidator, RejectReason, SaltSource,
    UnsignedDecoder, ValidationError,
};
use chatlink_crypto::ProfilePublicKey;
use chatlink_protocol::{
    Body, ChatAck, ChatBroadcast, ChatSubmission, ProtocolError, SignatureCache, MAX_MESSAGE_BYTES,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ChatSection;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("last-seen validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("message rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("too many unacknowledged messages: {count} (max {max})")]
    TooManyPending { count: usize, max: usize },
    #[error("no validator registered for sender {0}")]
    UnknownSender(Uuid),
}

impl SessionError {
    /// Whether the connection should be closed.
    pub fn disconnects(&self) -> bool {
        match self {
            SessionError::Decode(e) => e.breaks_chain(),
            SessionError::Rejected(_) | SessionError::UnknownSender(_) => false,
            _ => true,
        }
    }

    /// Localization key for the reason shown to the user.
    pub fn translation_key(&self) -> &'static str {
        match self {
            SessionError::Decode(e) => e.translation_key(),
            SessionError::Validation(e) => e.translation_key(),
            SessionError::Message(_) | SessionError::Protocol(_) => {
                "multiplayer.disconnect.invalid_packet"
            }
            SessionError::Rejected(_) | SessionError::UnknownSender(_) => {
                "chat.disabled.chain_broken"
            }
            SessionError::TooManyPending { .. } => "multiplayer.disconnect.too_many_pending_chats",
        }
    }
}

/// Chat policy shared by both ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub enforce_secure_chat: bool,
    pub max_pending_messages: usize,
    pub ack_offset_threshold: i32,
}

impl From<&ChatSection> for ChatSettings {
    fn from(section: &ChatSection) -> Self {
        Self {
            enforce_secure_chat: section.enforce_secure_chat,
            max_pending_messages: section.max_pending_messages,
            ack_offset_threshold: section.ack_offset_threshold,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&ChatSection::default())
    }
}

// ============================================================================
// Signing party
// ============================================================================

pub struct SenderSession<C> {
    sender: Uuid,
    encoder: Box<dyn MessageEncoder>,
    salt: Box<dyn SaltSource>,
    clock: C,
    settings: ChatSettings,
    cache: SignatureCache,
    tracker: LastSeenTracker,
    validators: HashMap<Uuid, Box<dyn MessageValidator>>,
}

impl<C: Clock + Clone + 'static> SenderSession<C> {
    pub fn new(
        sender: Uuid,
        encoder: Box<dyn MessageEncoder>,
        salt: Box<dyn SaltSource>,
        clock: C,
        settings: ChatSettings,
    ) -> Self {
        Self {
            sender,
            encoder,
            salt,
            clock,
            settings,
            cache: SignatureCache::new(),
            tracker: LastSeenTracker::new(),
            validators: HashMap::new(),
        }
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    pub fn register_sender(&mut self, sender: Uuid, validator: Box<dyn MessageValidator>) {
        self.validators.insert(sender, validator);
    }

    /// Register the validator the chat policy calls for: key-based if the
    /// sender has a key, otherwise downgrade or refuse.
    pub fn register_key(&mut self, sender: Uuid, key: Option<ProfilePublicKey>) {
        let validator: Box<dyn MessageValidator> = match key {
            Some(key) => Box::new(KeyBasedValidator::new(key, self.clock.clone())),
            None if self.settings.enforce_secure_chat => Box::new(RejectAllValidator),
            None => Box::new(AcceptUnsignedValidator::new(self.clock.clone())),
        };
        self.register_sender(sender, validator);
    }

    /// Build the next submission, acknowledging everything seen so far.
    pub fn compose(&mut self, text: &str) -> Result<ChatSubmission, SessionError> {
        if text.len() > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::StringTooLong {
                len: text.len(),
                max: MAX_MESSAGE_BYTES,
            }
            .into());
        }

        let (last_seen, update) = self.tracker.generate_update();
        let body = Body::new(
            text.to_string(),
            self.clock.now(),
            self.salt.next_salt(),
            last_seen,
        );
        let signature = self.encoder.encode(&body);
        if signature.is_none() {
            debug!(sender = %self.sender, "composing unsigned message");
        }

        Ok(ChatSubmission {
            content: body.content().to_string(),
            timestamp: body.timestamp(),
            salt: body.salt(),
            signature,
            last_seen: update,
        })
    }

    /// Resolve and validate a broadcast. Signed messages are tracked for the
    /// next acknowledgement whether or not they pass validation.
    pub fn receive(&mut self, broadcast: &ChatBroadcast) -> Result<ChatMessage, SessionError> {
        let message = ChatMessage::unpack(broadcast, &self.cache)?;
        self.cache.push(message.body(), message.signature());

        let signature = message.signature().cloned();
        let result = if message.is_system() {
            Ok(message)
        } else {
            let sender = message.sender();
            match self.validators.get_mut(&sender) {
                Some(validator) => validator.update_and_validate(message).map_err(Into::into),
                None => Err(SessionError::UnknownSender(sender)),
            }
        };

        if let Some(signature) = signature {
            let displayed = result
                .as_ref()
                .is_ok_and(|message| !message.is_fully_filtered());
            self.tracker.add_pending(signature, displayed);
        }

        if let Err(e) = &result {
            warn!(
                sender = %broadcast.link.sender(),
                index = broadcast.link.index(),
                "not displaying chat message: {e}"
            );
        }
        result
    }

    /// Standalone acknowledgement once enough messages went unanswered.
    pub fn take_ack(&mut self) -> Option<ChatAck> {
        if self.tracker.offset() > self.settings.ack_offset_threshold {
            Some(ChatAck {
                offset: self.tracker.take_offset(),
            })
        } else {
            None
        }
    }

    pub fn pending_offset(&self) -> i32 {
        self.tracker.offset()
    }
}

// ============================================================================
// Validating party
// ============================================================================

pub struct ReceiverSession {
    sender: Uuid,
    decoder: Box<dyn MessageDecoder>,
    settings: ChatSettings,
    cache: SignatureCache,
    validator: LastSeenValidator,
}

impl ReceiverSession {
    pub fn new(sender: Uuid, decoder: Box<dyn MessageDecoder>, settings: ChatSettings) -> Self {
        Self {
            sender,
            decoder,
            settings,
            cache: SignatureCache::new(),
            validator: LastSeenValidator::new(),
        }
    }

    /// Session with the decoder the chat policy calls for.
    pub fn for_key<C: Clock + 'static>(
        sender: Uuid,
        session: Uuid,
        key: Option<ProfilePublicKey>,
        clock: C,
        settings: ChatSettings,
    ) -> Self {
        let decoder: Box<dyn MessageDecoder> = match key {
            Some(key) => Box::new(ChainDecoder::new(key, sender, session, clock)),
            None if settings.enforce_secure_chat => Box::new(RejectAllDecoder),
            None => Box::new(UnsignedDecoder::new(sender, false, clock)),
        };
        Self::new(sender, decoder, settings)
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    /// Validate the submission's acknowledgement, then decode it.
    pub fn accept(&mut self, submission: ChatSubmission) -> Result<ChatMessage, SessionError> {
        let last_seen = self.validator.apply_update(&submission.last_seen)?;
        let body = submission.body(last_seen);
        let message = self.decoder.decode(submission.signature, body)?;
        debug!(
            sender = %self.sender,
            index = message.link().index(),
            signed = message.has_signature(),
            "accepted chat message"
        );
        Ok(message)
    }

    /// Pack `message` for this connection and start tracking it.
    pub fn relay(&mut self, message: &ChatMessage) -> Result<ChatBroadcast, SessionError> {
        let broadcast = message.pack(&self.cache);
        self.cache.push(message.body(), message.signature());

        if let Some(signature) = message.signature() {
            self.validator.add_pending(signature.clone());
            let count = self.validator.tracked_count();
            if count > self.settings.max_pending_messages {
                return Err(SessionError::TooManyPending {
                    count,
                    max: self.settings.max_pending_messages,
                });
            }
        }
        Ok(broadcast)
    }

    pub fn acknowledge(&mut self, ack: ChatAck) -> Result<(), SessionError> {
        self.validator.apply_offset(ack.offset)?;
        Ok(())
    }

    pub fn tracked_count(&self) -> usize {
        self.validator.tracked_count()
    }
}
