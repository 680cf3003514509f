//! Connection-level validation of messages relayed from other senders.
//!
//! Unlike the chain decoder, which runs where a message is first received,
//! these validators run at every recipient and only see fully formed
//! messages. One validator is kept per remote sender.

use chatlink_crypto::ProfilePublicKey;
use tracing::error;

use crate::clock::Clock;
use crate::message::ChatMessage;
use crate::RejectReason;

pub trait MessageValidator {
    fn update_and_validate(&mut self, message: ChatMessage) -> Result<ChatMessage, RejectReason>;
}

/// Verifies each message against the sender's key and insists that links
/// only move forward. The first failure is permanent.
pub struct KeyBasedValidator<C> {
    key: ProfilePublicKey,
    clock: C,
    last_message: Option<ChatMessage>,
    chain_valid: bool,
}

impl<C: Clock> KeyBasedValidator<C> {
    pub fn new(key: ProfilePublicKey, clock: C) -> Self {
        Self {
            key,
            clock,
            last_message: None,
            chain_valid: true,
        }
    }

    pub fn is_chain_valid(&self) -> bool {
        self.chain_valid
    }

    fn validate(&self, message: &ChatMessage) -> Result<(), RejectReason> {
        if self.key.has_expired(self.clock.now()) {
            error!(
                sender = %message.sender(),
                "received message with expired profile key"
            );
            return Err(RejectReason::ExpiredKey);
        }

        if !message.verify(&self.key) {
            error!(
                sender = %message.sender(),
                index = message.link().index(),
                "received message with invalid signature"
            );
            return Err(RejectReason::InvalidSignature);
        }

        // Re-delivery of the last message is harmless
        if let Some(last) = &self.last_message {
            if last != message && !message.link().is_descendant_of(last.link()) {
                error!(
                    sender = %message.sender(),
                    index = message.link().index(),
                    last_index = last.link().index(),
                    "received out-of-order chat message"
                );
                return Err(RejectReason::OutOfOrder);
            }
        }

        Ok(())
    }
}

impl<C: Clock> MessageValidator for KeyBasedValidator<C> {
    fn update_and_validate(&mut self, message: ChatMessage) -> Result<ChatMessage, RejectReason> {
        if !self.chain_valid {
            return Err(RejectReason::ChainInvalid);
        }
        if let Err(reason) = self.validate(&message) {
            self.chain_valid = false;
            return Err(reason);
        }
        self.last_message = Some(message.clone());
        Ok(message)
    }
}

/// Accepts anything, downgraded to unsigned.
pub struct AcceptUnsignedValidator<C> {
    clock: C,
}

impl<C: Clock> AcceptUnsignedValidator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> MessageValidator for AcceptUnsignedValidator<C> {
    fn update_and_validate(&mut self, message: ChatMessage) -> Result<ChatMessage, RejectReason> {
        Ok(message.remove_signature(self.clock.now()))
    }
}

/// For senders without a key while secure chat is enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllValidator;

impl MessageValidator for RejectAllValidator {
    fn update_and_validate(&mut self, _message: ChatMessage) -> Result<ChatMessage, RejectReason> {
        Err(RejectReason::SecureChatEnforced)
    }
}
