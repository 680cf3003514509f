//! Last-seen window tests -- acknowledgements, forged updates, backpressure.

use chatlink_chain::{ChatMessage, ValidationError};
use chatlink_node::{ChatSettings, SessionError};
use chatlink_protocol::{
    AcknowledgedSet, ChatAck, FilterMask, LastSeenUpdate, IGNORE_CHECKSUM, LAST_SEEN_WINDOW,
};

use crate::harness::{alice_and_bob, epoch};

fn validation(err: SessionError) -> ValidationError {
    assert!(err.disconnects(), "validation failures must disconnect");
    assert_eq!(
        err.translation_key(),
        "multiplayer.disconnect.chat_validation_failed"
    );
    match err {
        SessionError::Validation(e) => e,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_standalone_acks_bound_relay_window() {
    let settings = ChatSettings {
        ack_offset_threshold: 4,
        ..ChatSettings::default()
    };
    let (_, mut alice, mut bob) = alice_and_bob(settings);

    // Alice talks, Bob only listens
    let mut acks = Vec::new();
    for n in 0..10 {
        let message = alice.submit(&format!("monologue {n}")).unwrap();
        bob.deliver(&message).unwrap();
        acks.extend(bob.flush_ack().unwrap());
    }
    assert_eq!(acks, vec![5, 5]);
    assert_eq!(bob.connection.tracked_count(), LAST_SEEN_WINDOW);
}

#[test]
fn test_window_stays_in_sync_across_filtered_and_system_messages() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());
    let mut hidden = Vec::new();

    for n in 0..40 {
        let message = alice.submit(&format!("line {n}")).unwrap();
        alice.deliver(&message).unwrap();
        if n % 3 == 0 {
            hidden.push(message.signature().unwrap().clone());
            bob.deliver(&message.filter(FilterMask::FullyFiltered)).unwrap();
        } else {
            bob.deliver(&message).unwrap();
        }

        if n % 7 == 0 {
            let notice = ChatMessage::system(format!("notice {n}"), epoch());
            alice.deliver(&notice).unwrap();
            bob.deliver(&notice).unwrap();
        }

        if n % 5 == 4 {
            let reply = bob.submit(&format!("reply {n}")).unwrap();
            assert!(!reply.body().last_seen().is_empty());
            for signature in reply.body().last_seen().entries() {
                assert!(!hidden.contains(signature), "filtered message acknowledged");
            }
            alice.deliver(&reply).unwrap();
            bob.deliver(&reply).unwrap();
        }
    }
}

#[test]
fn test_acknowledging_empty_slot_is_fatal() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let mut submission = alice.client.compose("hi").unwrap();
    submission.last_seen.acknowledged = AcknowledgedSet::from_bits(1);
    submission.last_seen.checksum = IGNORE_CHECKSUM;

    let err = alice.connection.accept(submission).unwrap_err();
    assert_eq!(
        validation(err),
        ValidationError::UnknownAcknowledged { index: 0 }
    );
}

#[test]
fn test_withdrawing_acknowledgement_is_fatal() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let ping = alice.submit("ping").unwrap();
    alice.deliver(&ping).unwrap();
    let confirmed = alice.submit("confirms ping").unwrap();
    assert_eq!(confirmed.body().last_seen().len(), 1);

    let mut submission = alice.client.compose("forgets ping").unwrap();
    submission.last_seen = LastSeenUpdate::empty();
    let err = alice.connection.accept(submission).unwrap_err();
    assert_eq!(
        validation(err),
        ValidationError::IgnoredAcknowledged {
            index: LAST_SEEN_WINDOW - 1
        }
    );
}

#[test]
fn test_checksum_mismatch_is_fatal() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let ping = alice.submit("ping").unwrap();
    alice.deliver(&ping).unwrap();

    let mut submission = alice.client.compose("pong").unwrap();
    let actual = submission.last_seen.checksum;
    submission.last_seen.checksum = if actual == 1 { 2 } else { 1 };
    let err = alice.connection.accept(submission).unwrap_err();
    assert!(matches!(
        validation(err),
        ValidationError::ChecksumMismatch { .. }
    ));
}

#[test]
fn test_update_wider_than_window_is_fatal() {
    let (_, mut alice, _) = alice_and_bob(ChatSettings::default());

    let mut submission = alice.client.compose("wide").unwrap();
    submission.last_seen.acknowledged = AcknowledgedSet::from_bits(1 << LAST_SEEN_WINDOW);
    let err = alice.connection.accept(submission).unwrap_err();
    assert_eq!(
        validation(err),
        ValidationError::WindowTooLarge {
            len: LAST_SEEN_WINDOW + 1,
            max: LAST_SEEN_WINDOW
        }
    );
}

#[test]
fn test_ack_beyond_tracked_messages_is_fatal() {
    let (_, mut alice, mut bob) = alice_and_bob(ChatSettings::default());

    let message = alice.submit("one").unwrap();
    bob.deliver(&message).unwrap();

    let err = bob.connection.acknowledge(ChatAck { offset: 2 }).unwrap_err();
    assert_eq!(
        validation(err),
        ValidationError::IllegalOffset { offset: 2, max: 1 }
    );

    let err = bob.connection.acknowledge(ChatAck { offset: -1 }).unwrap_err();
    assert!(matches!(
        validation(err),
        ValidationError::IllegalOffset { offset: -1, .. }
    ));
}

#[test]
fn test_unacknowledged_backlog_disconnects() {
    let settings = ChatSettings {
        max_pending_messages: LAST_SEEN_WINDOW + 2,
        ..ChatSettings::default()
    };
    let (_, mut alice, mut bob) = alice_and_bob(settings);

    for n in 0..2 {
        let message = alice.submit(&format!("m{n}")).unwrap();
        bob.deliver(&message).unwrap();
    }
    let message = alice.submit("one too many").unwrap();
    let err = bob.deliver(&message).unwrap_err();
    assert!(matches!(
        err,
        SessionError::TooManyPending {
            count,
            max
        } if count == LAST_SEEN_WINDOW + 3 && max == LAST_SEEN_WINDOW + 2
    ));
    assert!(err.disconnects());
    assert_eq!(
        err.translation_key(),
        "multiplayer.disconnect.too_many_pending_chats"
    );
}
