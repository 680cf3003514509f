//! In-process chat room over loopback connections.
//!
//! Every participant has a client end ([`SenderSession`]) and a relay end
//! ([`ReceiverSession`]). Packets between the two are encoded and decoded
//! through the wire codec, so the room exercises the same bytes a real
//! transport would carry.

use chatlink_chain::{
    ChainEncoder, ChatMessage, Clock, MessageEncoder, OsSalt, SaltSource, SeededSalt,
    UnsignedEncoder,
};
use chatlink_crypto::{ProfileKeyPair, ProfilePublicKey};
use chatlink_protocol::{ProtocolError, Wire};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NodeConfig;
use crate::expand_tilde;
use crate::session::{ChatSettings, ReceiverSession, SenderSession, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("no participant {index} in a room of {len}")]
    UnknownParticipant { index: usize, len: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct ParticipantSpec {
    pub name: String,
    pub key: Option<ProfileKeyPair>,
}

struct Participant<C> {
    name: String,
    id: Uuid,
    client: SenderSession<C>,
    connection: ReceiverSession,
}

/// What happened to one message, as reported by the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub from: String,
    pub sender: Uuid,
    pub text: String,
    pub signed: bool,
    pub index: Option<u32>,
    pub submission_bytes: usize,
    pub relayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub to: String,
    pub broadcast_bytes: usize,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acked: Option<i32>,
}

pub struct LoopbackRoom<C> {
    participants: Vec<Participant<C>>,
    clock: C,
}

impl<C: Clock + Clone + 'static> LoopbackRoom<C> {
    pub fn new(
        specs: Vec<ParticipantSpec>,
        settings: ChatSettings,
        clock: C,
        key_lifetime: Duration,
        salt_seed: Option<u64>,
    ) -> Self {
        let expires_at = clock
            .now()
            .checked_add_signed(key_lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut participants = Vec::with_capacity(specs.len());
        let mut keys: Vec<(Uuid, Option<ProfilePublicKey>)> = Vec::with_capacity(specs.len());

        for (i, joiner) in specs.into_iter().enumerate() {
            let id = Uuid::new_v4();
            let session = Uuid::new_v4();
            let public = joiner.key.as_ref().map(|key| key.public_key(expires_at));

            let encoder: Box<dyn MessageEncoder> = match joiner.key {
                Some(key) => Box::new(ChainEncoder::new(key, id, session)),
                None => Box::new(UnsignedEncoder),
            };
            let salt: Box<dyn SaltSource> = match salt_seed {
                Some(seed) => Box::new(SeededSalt::new(seed.wrapping_add(i as u64))),
                None => Box::new(OsSalt),
            };

            info!(
                name = %joiner.name,
                sender = %id,
                signed = public.is_some(),
                fingerprint = %public.as_ref().map(|k| k.fingerprint()).unwrap_or_default(),
                "participant joined"
            );

            participants.push(Participant {
                name: joiner.name,
                id,
                client: SenderSession::new(id, encoder, salt, clock.clone(), settings),
                connection: ReceiverSession::for_key(
                    id,
                    session,
                    public.clone(),
                    clock.clone(),
                    settings,
                ),
            });
            keys.push((id, public));
        }

        for participant in &mut participants {
            for (id, key) in &keys {
                participant.client.register_key(*id, key.clone());
            }
        }

        Self {
            participants,
            clock,
        }
    }

    /// Room described by `[[participants]]`, with keys loaded from disk.
    pub fn from_config(cfg: &NodeConfig, clock: C) -> anyhow::Result<Self> {
        if cfg.participants.is_empty() {
            anyhow::bail!("no participants configured");
        }

        let mut specs = Vec::with_capacity(cfg.participants.len());
        for entry in &cfg.participants {
            let key = match &entry.private_key {
                Some(path) => {
                    let path = expand_tilde(path);
                    let key = ProfileKeyPair::from_file(&path).map_err(|e| {
                        anyhow::anyhow!("loading key for {} from {}: {e}", entry.name, path.display())
                    })?;
                    Some(key)
                }
                None => None,
            };
            specs.push(ParticipantSpec {
                name: entry.name.clone(),
                key,
            });
        }

        let key_lifetime = Duration::try_hours(cfg.identity.key_lifetime_hours).ok_or_else(|| {
            anyhow::anyhow!(
                "key_lifetime_hours out of range: {}",
                cfg.identity.key_lifetime_hours
            )
        })?;

        Ok(Self::new(
            specs,
            ChatSettings::from(&cfg.chat),
            clock,
            key_lifetime,
            cfg.simulation.seed,
        ))
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.name.as_str())
    }

    /// Participant `from` sends `text` through the relay to everyone.
    ///
    /// Rejections that leave the connection usable are reported in the
    /// returned [`Delivery`]; anything that would close a connection is
    /// returned as an error.
    pub fn send(&mut self, from: usize, text: &str) -> Result<Delivery, RoomError> {
        let len = self.participants.len();
        let sender = self
            .participants
            .get_mut(from)
            .ok_or(RoomError::UnknownParticipant { index: from, len })?;
        let submission = sender.client.compose(text)?;
        let (submission, submission_bytes) =
            transmit(&submission).map_err(SessionError::from)?;
        let signed = submission.signature.is_some();

        let mut delivery = Delivery {
            from: sender.name.clone(),
            sender: sender.id,
            text: text.to_string(),
            signed,
            index: None,
            submission_bytes,
            relayed: false,
            reason: None,
            outcomes: Vec::new(),
        };

        let message = match sender.connection.accept(submission) {
            Ok(message) => message,
            Err(e) if !e.disconnects() => {
                warn!(from = %delivery.from, "relay refused message: {e}");
                delivery.reason = Some(e.translation_key().to_string());
                return Ok(delivery);
            }
            Err(e) => return Err(e.into()),
        };

        delivery.relayed = true;
        delivery.signed = message.has_signature();
        delivery.index = message.has_signature().then(|| message.link().index());
        delivery.outcomes = self.broadcast(&message)?;
        Ok(delivery)
    }

    /// Relay an unsigned announcement to everyone.
    pub fn announce(&mut self, text: &str) -> Result<Vec<Outcome>, SessionError> {
        let message = ChatMessage::system(text, self.clock.now());
        self.broadcast(&message)
    }

    fn broadcast(&mut self, message: &ChatMessage) -> Result<Vec<Outcome>, SessionError> {
        let mut outcomes = Vec::with_capacity(self.participants.len());
        for recipient in &mut self.participants {
            let broadcast = recipient.connection.relay(message)?;
            let (broadcast, broadcast_bytes) = transmit(&broadcast)?;

            let (accepted, reason) = match recipient.client.receive(&broadcast) {
                Ok(_) => (true, None),
                Err(e) if !e.disconnects() => (false, Some(e.translation_key().to_string())),
                Err(e) => return Err(e),
            };

            let acked = match recipient.client.take_ack() {
                Some(ack) => {
                    let (ack, _) = transmit(&ack)?;
                    recipient.connection.acknowledge(ack)?;
                    Some(ack.offset)
                }
                None => None,
            };

            outcomes.push(Outcome {
                to: recipient.name.clone(),
                broadcast_bytes,
                accepted,
                reason,
                acked,
            });
        }
        Ok(outcomes)
    }
}

/// Encode and decode a packet, returning it with its wire size.
fn transmit<T: Wire>(packet: &T) -> Result<(T, usize), ProtocolError> {
    let bytes = packet.to_bytes()?;
    let len = bytes.len();
    Ok((T::decode_exact(bytes)?, len))
}
