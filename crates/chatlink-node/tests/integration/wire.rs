//! Wire-level tests -- cache-packed broadcasts, desync and malformed frames.

use bytes::Bytes;
use chatlink_chain::MessageError;
use chatlink_node::{ChatSettings, SessionError};
use chatlink_protocol::{
    ChatAck, ChatFrame, ProtocolError, SignatureCache, Wire, SIGNATURE_LEN,
};

use crate::harness::{alice_and_bob, broadcast_over_wire};

#[test]
fn test_cached_signatures_are_sent_by_reference() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    let ping = alice.submit("ping").unwrap();
    alice.deliver(&ping).unwrap();
    bob.deliver(&ping).unwrap();
    let pong = bob.submit("pong").unwrap();

    let cold = ChatFrame::Broadcast(pong.pack(&SignatureCache::new()))
        .to_bytes()
        .unwrap();
    let warm = ChatFrame::Broadcast(alice.connection.relay(&pong).unwrap())
        .to_bytes()
        .unwrap();
    assert!(warm.len() + SIGNATURE_LEN - 8 < cold.len());

    let broadcast = match ChatFrame::decode_exact(warm).unwrap() {
        ChatFrame::Broadcast(broadcast) => broadcast,
        other => panic!("expected broadcast, got {other:?}"),
    };
    let received = alice.client.receive(&broadcast).unwrap();
    assert_eq!(received.body().last_seen().entries()[0], *ping.signature().unwrap());
}

#[test]
fn test_missed_broadcast_desyncs_cache() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    let ping = alice.submit("ping").unwrap();
    alice.deliver(&ping).unwrap();
    // Relayed to Bob but lost before his client saw it
    let _lost = bob.connection.relay(&ping).unwrap();

    let pong = alice.submit("references ping").unwrap();
    let broadcast = broadcast_over_wire(bob.connection.relay(&pong).unwrap());
    let err = bob.client.receive(&broadcast).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Message(MessageError::Unpack(
            ProtocolError::UnknownSignature { .. }
        ))
    ));
    assert!(err.disconnects());
}

#[test]
fn test_unknown_frame_tag_is_rejected() {
    let err = ChatFrame::decode_exact(Bytes::from_static(&[0x07])).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnknownTag {
            what: "chat frame",
            tag: 7
        }
    ));
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let mut raw = ChatFrame::Ack(ChatAck { offset: 3 })
        .to_bytes()
        .unwrap()
        .to_vec();
    raw.push(0);
    let err = ChatFrame::decode_exact(Bytes::from(raw)).unwrap_err();
    assert!(matches!(err, ProtocolError::TrailingBytes(1)));
}

#[test]
fn test_truncated_submission_is_rejected() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());
    let bytes = ChatFrame::Submission(alice.client.compose("cut short").unwrap())
        .to_bytes()
        .unwrap();

    let truncated = bytes.slice(..bytes.len() - 1);
    let err = ChatFrame::decode_exact(truncated).unwrap_err();
    assert!(matches!(err, ProtocolError::UnexpectedEof { .. }));
}
