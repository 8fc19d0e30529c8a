//! arbor-node - tree overlay node and operator tools.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arbor_network::{Transport, TransportConfig};
use arbor_node::config::NodeConfig;
use arbor_node::runtime;
use arbor_protocol::crypto::{load_or_create_keypair, sign_wire};
use arbor_protocol::{Address, Command, WIRE_DELIMITER};

#[derive(Parser)]
#[command(name = "arbor-node", version, about = "Self-organizing command tree node")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Join the tree and serve commands.
    Run {
        /// TOML config file. Defaults to <config_dir>/arbor/node.toml.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address override, e.g. 0.0.0.0:4000.
        #[arg(long)]
        listen: Option<Address>,
        /// Address announced to discovery and sent in INIT.
        #[arg(long)]
        advertise_host: Option<IpAddr>,
        /// Act as the tree root and skip bootstrap.
        #[arg(long)]
        master: bool,
        #[arg(long)]
        resource_id: Option<String>,
    },
    /// Send one command to a node and print its reply.
    Send {
        addr: Address,
        /// Command words, e.g. `console uptime`.
        #[arg(required = true, trailing_var_arg = true)]
        words: Vec<String>,
        /// Send the words as-is instead of prefixing a fresh hash.
        #[arg(long)]
        raw: bool,
        /// Sign with the Ed25519 seed at this path.
        #[arg(long)]
        key: Option<PathBuf>,
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,
    },
    /// Create a signing key and print its public half.
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print `<message>@<signature>` for a message.
    Sign {
        #[arg(long)]
        key: PathBuf,
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        CliCommand::Run { config, listen, advertise_host, master, resource_id } => {
            let path = match config {
                Some(path) => path,
                None => NodeConfig::default_path().context("no config directory on this platform")?,
            };
            let mut config = NodeConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if let Some(listen) = listen {
                config.network.listen_host = listen.host;
                config.network.listen_port = listen.port;
            }
            if advertise_host.is_some() {
                config.network.advertise_host = advertise_host;
            }
            if master {
                config.node.master = true;
            }
            if let Some(resource_id) = resource_id {
                config.node.resource_id = resource_id;
            }
            runtime::run(config, shutdown_signal()).await
        }
        CliCommand::Send { addr, words, raw, key, timeout_ms } => {
            let line = words.join(WIRE_DELIMITER);
            let message = if raw {
                line
            } else {
                let hash = uuid::Uuid::new_v4().simple().to_string();
                format!("{hash}{WIRE_DELIMITER}{line}")
            };
            let command = Command::parse(&message, WIRE_DELIMITER)
                .with_context(|| format!("not a valid command: {message}"))?;

            let mut text = command.to_string();
            if let Some(path) = key {
                let key = load_signing_key(&path)?;
                text = sign_wire(&key, &text);
            }

            let transport = Transport::new(TransportConfig {
                io_timeout: Duration::from_millis(timeout_ms),
                ..Default::default()
            });
            let reply = transport
                .send_message_to(addr, &text)
                .await
                .with_context(|| format!("failed to reach {addr}"))?;
            println!("{reply}");
            Ok(())
        }
        CliCommand::Keygen { out } => {
            if out.exists() {
                anyhow::bail!("{} already exists", out.display());
            }
            let key = load_or_create_keypair(&out)?;
            println!("{}", hex::encode(key.verifying_key().to_bytes()));
            Ok(())
        }
        CliCommand::Sign { key, message } => {
            let key = load_signing_key(&key)?;
            println!("{}", sign_wire(&key, &message.join(WIRE_DELIMITER)));
            Ok(())
        }
    }
}

fn load_signing_key(path: &std::path::Path) -> Result<arbor_protocol::crypto::SigningKey> {
    if !path.exists() {
        anyhow::bail!("key file {} does not exist", path.display());
    }
    load_or_create_keypair(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
