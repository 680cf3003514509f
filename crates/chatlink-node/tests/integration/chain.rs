//! Signature chain tests -- tampering, reordering and key expiry.

use chatlink_chain::{DecodeError, RejectReason};
use chatlink_node::{ChatSettings, SessionError};
use chatlink_protocol::Signature;
use chrono::{DateTime, Duration, Utc};

use crate::harness::{alice_and_bob, epoch, key_lifetime, submission_over_wire};

#[test]
fn test_conversation_links_replies_to_what_was_seen() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    let ping = alice.submit("ping").unwrap();
    alice.deliver(&ping).unwrap();
    let seen = bob.deliver(&ping).unwrap();
    assert_eq!(seen.signed_content(), "ping");
    assert!(seen.has_signature_from(alice.id));

    let pong = bob.submit("pong").unwrap();
    assert_eq!(pong.link().index(), 0);
    assert_eq!(
        pong.body().last_seen().entries().to_vec(),
        vec![ping.signature().unwrap().clone()]
    );

    alice.deliver(&pong).unwrap();
    bob.deliver(&pong).unwrap();

    let again = alice.submit("ping again").unwrap();
    assert_eq!(again.link().index(), 1);
    assert_eq!(again.body().last_seen().len(), 2);
}

#[test]
fn test_tampered_signature_breaks_chain() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let mut submission = alice.client.compose("hello").unwrap();
    let mut bytes = *submission.signature.as_ref().unwrap().as_bytes();
    bytes[0] ^= 0x01;
    submission.signature = Some(Signature::from_array(bytes));

    let err = alice.connection.accept(submission).unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::InvalidSignature)));
    assert!(err.disconnects());
    assert_eq!(err.translation_key(), "chat.disabled.invalid_signature");

    // Nothing further is accepted on this connection
    let err = alice.submit("honest this time").unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::ChainBroken)));
}

#[test]
fn test_edited_content_fails_verification() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let mut submission = alice.client.compose("transfer 10").unwrap();
    submission.content = "transfer 1000".into();
    let err = alice
        .connection
        .accept(submission_over_wire(submission))
        .unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::InvalidSignature)));
}

#[test]
fn test_replayed_submission_is_rejected() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let submission = alice.client.compose("once").unwrap();
    alice.connection.accept(submission.clone()).unwrap();

    // Signed for index 0, the relay now expects index 1
    let err = alice.connection.accept(submission).unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::InvalidSignature)));
}

#[test]
fn test_dropped_submission_breaks_chain() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let _lost = alice.client.compose("lost in transit").unwrap();
    let err = alice.submit("arrives").unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::InvalidSignature)));
    assert!(err.disconnects());
}

#[test]
fn test_timestamp_going_backwards_is_out_of_order() {
    let (clock, mut alice, _) = alice_and_bob(ChatSettings::default());

    clock.advance(Duration::seconds(10));
    let later = alice.client.compose("from the future").unwrap();
    clock.set(epoch());
    let earlier = alice.client.compose("from the past").unwrap();

    alice.connection.accept(later).unwrap();
    let err = alice.connection.accept(earlier).unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::OutOfOrder)));
    assert!(err.disconnects());
    assert_eq!(err.translation_key(), "chat.disabled.out_of_order_chat");
}

#[test]
fn test_equal_timestamps_are_in_order() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let first = alice.submit("same").unwrap();
    let second = alice.submit("instant").unwrap();
    assert_eq!(first.timestamp(), second.timestamp());
    assert_eq!(second.link().index(), 1);
}

#[test]
fn test_timestamp_at_end_of_time_does_not_crash_relay() {
    let (clock, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    let end_of_time =
        DateTime::from_timestamp_millis(DateTime::<Utc>::MAX_UTC.timestamp_millis()).unwrap();
    clock.set(end_of_time);
    let submission = alice.client.compose("see you never").unwrap();
    clock.set(epoch());

    let message = alice
        .connection
        .accept(submission_over_wire(submission))
        .unwrap();
    assert_eq!(message.timestamp(), end_of_time);
    assert!(!message.has_expired_server(epoch()));
    assert_eq!(bob.deliver(&message).unwrap(), message);

    // Nothing can follow a message from the end of time
    let err = alice.submit("back to now").unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::OutOfOrder)));
}

#[test]
fn test_expired_key_is_refused_without_disconnect() {
    let (clock, mut alice, _) = alice_and_bob(ChatSettings::default());

    alice.submit("before expiry").unwrap();
    clock.advance(key_lifetime() + Duration::seconds(1));

    let err = alice.submit("after expiry").unwrap_err();
    assert!(matches!(err, SessionError::Decode(DecodeError::ExpiredKey)));
    assert!(!err.disconnects());
    assert_eq!(err.translation_key(), "chat.disabled.expiredProfileKey");
}

#[test]
fn test_client_rejection_is_sticky_and_not_acknowledged() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    // Alice holds the wrong key for Bob
    alice.client.register_key(bob.id, Some(alice.key.clone()));

    let first = bob.submit("one").unwrap();
    let err = alice.deliver(&first).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(RejectReason::InvalidSignature)
    ));
    assert!(!err.disconnects());

    let second = bob.submit("two").unwrap();
    let err = alice.deliver(&second).unwrap_err();
    assert!(matches!(err, SessionError::Rejected(RejectReason::ChainInvalid)));

    // Rejected messages hold window slots but are never acknowledged
    let reply = alice.submit("anyone there?").unwrap();
    assert!(reply.body().last_seen().is_empty());
}
