//! chatlink Node -- library crate wiring chat sessions together.
//!
//! Re-exports config, sessions and the loopback room so integration tests
//! and the binary share one code path.

pub mod config;
pub mod session;
pub mod simulation;

pub use session::{ChatSettings, ReceiverSession, SenderSession, SessionError};
pub use simulation::{Delivery, LoopbackRoom, Outcome, ParticipantSpec, RoomError};

use std::path::PathBuf;

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_or_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
