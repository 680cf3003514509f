//! Loopback room tests -- many participants over a long conversation.

use chatlink_crypto::ProfileKeyPair;
use chatlink_node::config::NodeConfig;
use chatlink_node::{ChatSettings, LoopbackRoom, ParticipantSpec};
use chrono::Duration;

use crate::harness::{clock, ALICE, BOB};

fn specs(guest: bool) -> Vec<ParticipantSpec> {
    let mut specs = vec![
        ParticipantSpec {
            name: "alice".into(),
            key: Some(ProfileKeyPair::from_pkcs8_der(ALICE).unwrap()),
        },
        ParticipantSpec {
            name: "bob".into(),
            key: Some(ProfileKeyPair::from_pkcs8_der(BOB).unwrap()),
        },
    ];
    if guest {
        specs.push(ParticipantSpec {
            name: "guest".into(),
            key: None,
        });
    }
    specs
}

#[test]
fn test_long_conversation_stays_consistent() {
    let settings = ChatSettings {
        ack_offset_threshold: 5,
        max_pending_messages: 64,
        ..ChatSettings::default()
    };
    let mut room = LoopbackRoom::new(specs(false), settings, clock(), Duration::hours(1), Some(11));

    // Uneven turns so each member sees long runs of the others' messages
    let turns = [0, 0, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 0];
    let mut sent = [0u32; 2];
    for round in 0..10 {
        for &from in &turns {
            let delivery = room
                .send(from, &format!("round {round} from {from}"))
                .unwrap();
            assert!(delivery.relayed);
            assert_eq!(delivery.index, Some(sent[from]));
            assert!(delivery.outcomes.iter().all(|o| o.accepted));
            sent[from] += 1;
        }
    }
}

#[test]
fn test_guest_refused_when_secure_chat_enforced() {
    let mut room = LoopbackRoom::new(
        specs(true),
        ChatSettings::default(),
        clock(),
        Duration::hours(1),
        Some(1),
    );

    let delivery = room.send(2, "hello?").unwrap();
    assert!(!delivery.relayed);
    assert!(!delivery.signed);
    assert!(delivery.outcomes.is_empty());
    assert_eq!(
        delivery.reason.as_deref(),
        Some("chat.disabled.missingProfileKey")
    );

    let delivery = room.send(0, "signed chat continues").unwrap();
    assert!(delivery.relayed);
    assert_eq!(delivery.outcomes.len(), 3);
    assert!(delivery.outcomes.iter().all(|o| o.accepted));
}

#[test]
fn test_guest_downgraded_when_lenient() {
    let settings = ChatSettings {
        enforce_secure_chat: false,
        ..ChatSettings::default()
    };
    let mut room = LoopbackRoom::new(specs(true), settings, clock(), Duration::hours(1), Some(2));

    room.send(0, "signed").unwrap();
    let delivery = room.send(2, "unsigned").unwrap();
    assert!(delivery.relayed);
    assert!(!delivery.signed);
    assert_eq!(delivery.index, None);
    assert!(delivery.outcomes.iter().all(|o| o.accepted));

    let delivery = room.send(1, "still signed").unwrap();
    assert!(delivery.signed);
    assert_eq!(delivery.index, Some(0));
}

#[test]
fn test_room_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alice.pk8"), ALICE).unwrap();
    std::fs::write(dir.path().join("bob.pk8"), BOB).unwrap();

    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[chat]
ack_offset_threshold = 2

[[participants]]
name = "alice"
private_key = "{alice}"

[[participants]]
name = "bob"
private_key = "{bob}"

[simulation]
seed = 99
"#,
            alice = dir.path().join("alice.pk8").display(),
            bob = dir.path().join("bob.pk8").display(),
        ),
    )
    .unwrap();

    let cfg = NodeConfig::load_or_default(&config_path).unwrap();
    let mut room = LoopbackRoom::from_config(&cfg, clock()).unwrap();
    assert_eq!(room.len(), 2);

    let mut acked = 0;
    for n in 0..6 {
        let delivery = room.send(0, &format!("config {n}")).unwrap();
        assert!(delivery.signed);
        acked += delivery.outcomes.iter().filter(|o| o.acked.is_some()).count();
        let line = serde_json::to_string(&delivery).unwrap();
        assert!(line.contains("\"from\":\"alice\""));
    }
    assert!(acked >= 1);
}

#[test]
fn test_missing_key_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg: NodeConfig = toml::from_str(&format!(
        "[[participants]]\nname = \"alice\"\nprivate_key = \"{}\"\n",
        dir.path().join("absent.pk8").display()
    ))
    .unwrap();

    let err = LoopbackRoom::from_config(&cfg, clock()).err().unwrap();
    assert!(err.to_string().contains("alice"));
}
