//! chatlink Node -- signed chat relay simulator.
//!
//! Usage:
//!   chatlink-node                      # Run the loopback simulation
//!   chatlink-node --config path.toml   # Run with custom config
//!   chatlink-node identity             # Show participant key fingerprints
//!   chatlink-node config               # Print the effective config

use chatlink_node::config::NodeConfig;
use chatlink_node::{expand_tilde, LoopbackRoom};

use chatlink_chain::SystemClock;
use chatlink_crypto::ProfileKeyPair;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatlink-node", about = "Signed chat relay simulator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "~/.chatlink/config.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the loopback simulation (default)
    Simulate {
        /// Number of messages to send (overrides config)
        #[arg(short, long)]
        messages: Option<usize>,
    },
    /// Show configured participant keys
    Identity {
        #[command(subcommand)]
        action: Option<IdentityAction>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Fingerprints and expiry of every configured key
    Show,
    /// Fingerprint of a single PKCS#8 key file
    Inspect {
        /// Path to the key
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chatlink_node=info,chatlink_chain=info".into());
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = expand_tilde(&cli.config);
    let cfg = NodeConfig::load_or_default(&config_path)?;

    match cli.command {
        Some(Commands::Simulate { messages }) => {
            run_simulation(&cfg, messages.unwrap_or(cfg.simulation.messages))?;
        }
        None => {
            run_simulation(&cfg, cfg.simulation.messages)?;
        }
        Some(Commands::Identity { action }) => match action {
            Some(IdentityAction::Show) | None => show_identities(&cfg)?,
            Some(IdentityAction::Inspect { path }) => {
                let path = expand_tilde(&path);
                let key = ProfileKeyPair::from_file(&path)?;
                println!("Key file: {}", path.display());
                println!(
                    "Fingerprint: {}",
                    chatlink_crypto::key_fingerprint(key.public_key_der())
                );
            }
        },
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

fn run_simulation(cfg: &NodeConfig, messages: usize) -> anyhow::Result<()> {
    let mut room = LoopbackRoom::from_config(cfg, SystemClock)?;
    let names: Vec<String> = room.names().map(str::to_string).collect();

    tracing::info!(
        participants = room.len(),
        messages,
        enforce_secure_chat = cfg.chat.enforce_secure_chat,
        "starting chat simulation"
    );

    room.announce("simulation started")?;

    let mut relayed = 0usize;
    for n in 0..messages {
        let from = n % room.len();
        let text = format!("message {n} from {}", names[from]);
        let delivery = room.send(from, &text)?;
        relayed += delivery.relayed as usize;
        println!("{}", serde_json::to_string(&delivery)?);
    }

    tracing::info!(messages, relayed, "simulation finished");
    Ok(())
}

fn show_identities(cfg: &NodeConfig) -> anyhow::Result<()> {
    let expires_at = Duration::try_hours(cfg.identity.key_lifetime_hours)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| anyhow::anyhow!("key_lifetime_hours out of range"))?;
    for participant in &cfg.participants {
        match &participant.private_key {
            Some(path) => {
                let path = expand_tilde(path);
                let key = ProfileKeyPair::from_file(&path)?;
                let public = key.public_key(expires_at);
                println!(
                    "{}: {} (expires {})",
                    participant.name,
                    public.fingerprint(),
                    public.expires_at().to_rfc3339()
                );
            }
            None => println!("{}: unsigned", participant.name),
        }
    }
    Ok(())
}
