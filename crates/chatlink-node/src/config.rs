//! Configuration types for chatlink-node.
//! Parsed from ~/.chatlink/config.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<ParticipantEntry>,
    #[serde(default)]
    pub simulation: SimulationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_true")]
    pub enforce_secure_chat: bool,
    /// Relayed messages a connection may leave unacknowledged.
    #[serde(default = "default_4096")]
    pub max_pending_messages: usize,
    /// Unacknowledged messages before a standalone ack is sent.
    #[serde(default = "default_64")]
    pub ack_offset_threshold: i32,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            enforce_secure_chat: true,
            max_pending_messages: 4096,
            ack_offset_threshold: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySection {
    /// How long a loaded profile key stays valid.
    #[serde(default = "default_48")]
    pub key_lifetime_hours: i64,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            key_lifetime_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub name: String,
    /// PKCS#8 DER RSA-2048 key. Participants without one chat unsigned.
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_20")]
    pub messages: usize,
    /// Fixed salt seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            messages: 20,
            seed: None,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_4096() -> usize {
    4096
}
fn default_64() -> i32 {
    64
}
fn default_48() -> i64 {
    48
}
fn default_20() -> usize {
    20
}

impl NodeConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
