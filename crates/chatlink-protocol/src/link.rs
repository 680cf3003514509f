//! Message links -- a message's position in one sender's session chain.

use bytes::{Bytes, BytesMut};
use chatlink_crypto::SignaturePayload;
use serde::Serialize;
use uuid::Uuid;

use crate::codec::{self, Wire};
use crate::ProtocolError;

/// Highest index a link can carry; advancing past it exhausts the chain.
pub const MAX_LINK_INDEX: u32 = i32::MAX as u32;

/// (index, sender, session). Indices start at 0 and grow by exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    index: u32,
    sender: Uuid,
    session: Uuid,
}

impl Link {
    pub fn new(index: u32, sender: Uuid, session: Uuid) -> Self {
        debug_assert!(index <= MAX_LINK_INDEX);
        Self {
            index,
            sender,
            session,
        }
    }

    /// First link of a fresh session.
    pub fn root(sender: Uuid, session: Uuid) -> Self {
        Self::new(0, sender, session)
    }

    /// Link for an unsigned message: index 0, no session.
    pub fn unsigned(sender: Uuid) -> Self {
        Self::new(0, sender, Uuid::nil())
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// System messages come from the nil sender.
    pub fn is_system(&self) -> bool {
        self.sender.is_nil()
    }

    /// The next link, or `None` once the index space is exhausted.
    pub fn advance(&self) -> Option<Link> {
        if self.index >= MAX_LINK_INDEX {
            return None;
        }
        Some(Self::new(self.index + 1, self.sender, self.session))
    }

    pub fn is_descendant_of(&self, other: &Link) -> bool {
        self.index > other.index && self.sender == other.sender && self.session == other.session
    }

    pub fn update_signature(&self, payload: &mut SignaturePayload) {
        payload.update(self.sender.as_bytes());
        payload.update(self.session.as_bytes());
        payload.update_i32(self.index as i32);
    }
}

impl Wire for Link {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_var_int(dst, self.index as i32);
        codec::put_uuid(dst, &self.sender);
        codec::put_uuid(dst, &self.session);
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let index = codec::get_var_int(src)?;
        if index < 0 {
            return Err(ProtocolError::Negative(index));
        }
        let sender = codec::get_uuid(src)?;
        let session = codec::get_uuid(src)?;
        Ok(Self::new(index as u32, sender, session))
    }
}
