//! Test harness for in-process chat sessions.
//!
//! A [`Member`] owns both ends of one connection: the client session that
//! signs and displays, and the relay session that validates and packs. All
//! packets cross a [`ChatFrame`] encode/decode so tests see real wire bytes.

use chatlink_chain::{ChainEncoder, ChatMessage, ManualClock, SeededSalt};
use chatlink_crypto::{ProfileKeyPair, ProfilePublicKey};
use chatlink_node::{ChatSettings, ReceiverSession, SenderSession, SessionError};
use chatlink_protocol::{ChatAck, ChatBroadcast, ChatFrame, ChatSubmission, Wire};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const ALICE: &[u8] = include_bytes!("../../../../testdata/alice_rsa_2048.pk8");
pub const BOB: &[u8] = include_bytes!("../../../../testdata/bob_rsa_2048.pk8");

pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn clock() -> ManualClock {
    ManualClock::new(epoch())
}

/// Keys issued by the harness stay valid for one hour of simulated time.
pub fn key_lifetime() -> Duration {
    Duration::hours(1)
}

pub struct Member {
    pub id: Uuid,
    pub key: ProfilePublicKey,
    pub client: SenderSession<ManualClock>,
    pub connection: ReceiverSession,
}

#[allow(dead_code)]
impl Member {
    pub fn new(der: &[u8], n: u128, clock: &ManualClock, settings: ChatSettings) -> Self {
        let private = ProfileKeyPair::from_pkcs8_der(der).unwrap();
        let key = private.public_key(epoch() + key_lifetime());
        let id = Uuid::from_u128(n);
        let session = Uuid::from_u128(n << 64);

        let client = SenderSession::new(
            id,
            Box::new(ChainEncoder::new(private, id, session)),
            Box::new(SeededSalt::new(n as u64)),
            clock.clone(),
            settings,
        );
        let connection =
            ReceiverSession::for_key(id, session, Some(key.clone()), clock.clone(), settings);

        Self {
            id,
            key,
            client,
            connection,
        }
    }

    /// Compose `text` and have the relay accept it.
    pub fn submit(&mut self, text: &str) -> Result<ChatMessage, SessionError> {
        let submission = self.client.compose(text)?;
        self.connection.accept(submission_over_wire(submission))
    }

    /// Relay `message` over this member's connection and display it.
    pub fn deliver(&mut self, message: &ChatMessage) -> Result<ChatMessage, SessionError> {
        let broadcast = self.connection.relay(message)?;
        self.client.receive(&broadcast_over_wire(broadcast))
    }

    /// Send a standalone acknowledgement if one is due.
    pub fn flush_ack(&mut self) -> Result<Option<i32>, SessionError> {
        match self.client.take_ack() {
            Some(ack) => {
                let ack = ack_over_wire(ack);
                self.connection.acknowledge(ack)?;
                Ok(Some(ack.offset))
            }
            None => Ok(None),
        }
    }
}

/// Members that all know each other's keys.
pub fn introduce(members: &mut [Member]) {
    let keys: Vec<(Uuid, ProfilePublicKey)> =
        members.iter().map(|m| (m.id, m.key.clone())).collect();
    for member in members.iter_mut() {
        for (id, key) in &keys {
            member.client.register_key(*id, Some(key.clone()));
        }
    }
}

/// Alice and Bob, introduced, sharing one clock.
pub fn alice_and_bob(settings: ChatSettings) -> (ManualClock, Member, Member) {
    let clock = clock();
    let mut members = vec![
        Member::new(ALICE, 1, &clock, settings),
        Member::new(BOB, 2, &clock, settings),
    ];
    introduce(&mut members);
    let bob = members.pop().unwrap();
    let alice = members.pop().unwrap();
    (clock, alice, bob)
}

pub fn over_wire(frame: ChatFrame) -> ChatFrame {
    let bytes = frame.to_bytes().unwrap();
    ChatFrame::decode_exact(bytes).unwrap()
}

pub fn submission_over_wire(submission: ChatSubmission) -> ChatSubmission {
    match over_wire(ChatFrame::Submission(submission)) {
        ChatFrame::Submission(submission) => submission,
        other => panic!("expected submission, got {other:?}"),
    }
}

pub fn broadcast_over_wire(broadcast: ChatBroadcast) -> ChatBroadcast {
    match over_wire(ChatFrame::Broadcast(broadcast)) {
        ChatFrame::Broadcast(broadcast) => broadcast,
        other => panic!("expected broadcast, got {other:?}"),
    }
}

pub fn ack_over_wire(ack: ChatAck) -> ChatAck {
    match over_wire(ChatFrame::Ack(ack)) {
        ChatFrame::Ack(ack) => ack,
        other => panic!("expected ack, got {other:?}"),
    }
}
