//! The aggregate chat message.

use chatlink_crypto::{SignaturePayload, SignatureVerifier};
use chatlink_protocol::{
    Body, ChatBroadcast, ChatContent, FilterMask, Link, Signature, SignatureCache, PARAMS_V1,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::MessageError;

/// Leading field of every signed payload.
pub const SIGNATURE_VERSION: i32 = PARAMS_V1.message_signature_version;

/// A chat message: where it sits in its sender's chain, what was signed, and
/// how the relay wants it shown.
///
/// Every transformation returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    link: Link,
    signature: Option<Signature>,
    body: Body,
    unsigned_content: Option<ChatContent>,
    filter_mask: FilterMask,
}

impl ChatMessage {
    /// # Errors
    ///
    /// `MessageError::SignedSystemMessage` if `link` names the system sender
    /// and a signature is supplied.
    pub fn new(
        link: Link,
        signature: Option<Signature>,
        body: Body,
        unsigned_content: Option<ChatContent>,
        filter_mask: FilterMask,
    ) -> Result<Self, MessageError> {
        if link.is_system() && signature.is_some() {
            return Err(MessageError::SignedSystemMessage);
        }
        Ok(Self {
            link,
            signature,
            body,
            unsigned_content,
            filter_mask,
        })
    }

    pub fn system(content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::unsigned(Uuid::nil(), content, now)
    }

    pub fn unsigned(sender: Uuid, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            link: Link::unsigned(sender),
            signature: None,
            body: Body::unsigned(content.into(), now),
            unsigned_content: None,
            filter_mask: FilterMask::PassThrough,
        }
    }

    /// Canonical bytes a sender signs for `link` and `body`.
    pub fn signed_payload(link: &Link, body: &Body) -> SignaturePayload {
        let mut payload = SignaturePayload::new();
        payload.update_i32(SIGNATURE_VERSION);
        link.update_signature(&mut payload);
        body.update_signature(&mut payload);
        payload
    }

    pub fn with_unsigned_content(&self, content: ChatContent) -> Self {
        Self {
            unsigned_content: Some(content),
            ..self.clone()
        }
    }

    pub fn remove_unsigned_content(&self) -> Self {
        Self {
            unsigned_content: None,
            ..self.clone()
        }
    }

    pub fn filter(&self, mask: FilterMask) -> Self {
        Self {
            filter_mask: mask,
            ..self.clone()
        }
    }

    /// Hide the message entirely, or lift any filter.
    pub fn filter_enabled(&self, enabled: bool) -> Self {
        self.filter(if enabled {
            FilterMask::FullyFiltered
        } else {
            FilterMask::PassThrough
        })
    }

    /// Unsigned equivalent: unchained link, fresh unsigned body stamped at
    /// `now`. Unsigned content and filter mask carry over.
    pub fn remove_signature(&self, now: DateTime<Utc>) -> Self {
        Self {
            link: Link::unsigned(self.sender()),
            signature: None,
            body: Body::unsigned(self.body.content().to_string(), now),
            unsigned_content: self.unsigned_content.clone(),
            filter_mask: self.filter_mask.clone(),
        }
    }

    pub fn verify(&self, verifier: &impl SignatureVerifier) -> bool {
        self.signature.as_ref().is_some_and(|signature| {
            signature.verify(verifier, &Self::signed_payload(&self.link, &self.body))
        })
    }

    pub fn has_expired_server(&self, now: DateTime<Utc>) -> bool {
        self.has_expired(now, PARAMS_V1.server_expiry_secs)
    }

    pub fn has_expired_client(&self, now: DateTime<Utc>) -> bool {
        self.has_expired(now, PARAMS_V1.client_expiry_secs)
    }

    /// A deadline past the representable range never expires.
    fn has_expired(&self, now: DateTime<Utc>, expiry_secs: i64) -> bool {
        Duration::try_seconds(expiry_secs)
            .and_then(|expiry| self.timestamp().checked_add_signed(expiry))
            .is_some_and(|deadline| now > deadline)
    }

    /// What to display: the relay's override if present, else the signed text.
    pub fn decorated_content(&self) -> ChatContent {
        self.unsigned_content
            .clone()
            .unwrap_or_else(|| ChatContent::literal(self.body.content()))
    }

    /// Signed text with the filter mask applied, `None` if fully filtered.
    pub fn filtered_content(&self) -> Option<ChatContent> {
        self.filter_mask
            .apply(self.body.content())
            .map(ChatContent::literal)
    }

    pub fn is_system(&self) -> bool {
        self.link.is_system()
    }

    pub fn is_fully_filtered(&self) -> bool {
        self.filter_mask.is_fully_filtered()
    }

    pub fn has_signature(&self) -> bool {
        self.signature.is_some()
    }

    pub fn has_signature_from(&self, sender: Uuid) -> bool {
        self.has_signature() && self.link.sender() == sender
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn unsigned_content(&self) -> Option<&ChatContent> {
        self.unsigned_content.as_ref()
    }

    pub fn filter_mask(&self) -> &FilterMask {
        &self.filter_mask
    }

    pub fn sender(&self) -> Uuid {
        self.link.sender()
    }

    pub fn signed_content(&self) -> &str {
        self.body.content()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.body.timestamp()
    }

    pub fn salt(&self) -> i64 {
        self.body.salt()
    }

    /// Broadcast form against the recipient's cache mirror. Pack before
    /// pushing this message into the cache.
    pub fn pack(&self, cache: &SignatureCache) -> ChatBroadcast {
        ChatBroadcast {
            link: self.link,
            signature: self.signature.as_ref().map(|s| s.pack(cache)),
            body: self.body.pack(cache),
            unsigned_content: self.unsigned_content.clone(),
            filter_mask: self.filter_mask.clone(),
        }
    }

    pub fn unpack(broadcast: &ChatBroadcast, cache: &SignatureCache) -> Result<Self, MessageError> {
        let signature = broadcast
            .signature
            .as_ref()
            .map(|packed| packed.unpack(cache))
            .transpose()?;
        let body = broadcast.body.unpack(cache)?;
        Self::new(
            broadcast.link,
            signature,
            body,
            broadcast.unsigned_content.clone(),
            broadcast.filter_mask.clone(),
        )
    }
}
