//! sealgate: command-line client for a running sealgated
//!
//! Commands:
//!   store <id> <data>       - store a record, print its key (hex)
//!   retrieve <id> <key>     - fetch and decrypt a record
//!   delete <id>             - delete a record
//!   keygen                  - print a fresh [crypto] section for sealgated
//!
//! Ids and data are taken as raw strings unless `--hex` is given. Keys are
//! always hex.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sealgate_core::config::SealgateConfig;
use sealgate_gateway::GatewayClient;
use std::path::{Path, PathBuf};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealgate",
    version,
    about = "sealgate record gateway client",
    long_about = "sealgate: store, retrieve and delete encrypted records through a sealgated gateway"
)]
struct Cli {
    /// Path to sealgate configuration file (used for the default address)
    #[arg(long, short = 'c', env = "SEALGATE_CONFIG", default_value = "/etc/sealgate/config.toml")]
    config: PathBuf,

    /// Gateway address (default: daemon.listen from the config file)
    #[arg(long, short = 'a', env = "SEALGATE_ADDR")]
    addr: Option<String>,

    /// Treat ids and record data as hex instead of raw strings
    #[arg(long, global = true)]
    hex: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a record; prints the record key, which the gateway does not keep
    Store { id: String, data: String },

    /// Retrieve and decrypt a record
    Retrieve {
        id: String,
        /// Record key (hex) printed by `store`
        key: String,
    },

    /// Delete a record
    Delete { id: String },

    /// Print a random id key and id nonce for the [crypto] config section
    Keygen {
        /// Id key length in bytes (16, 24 or 32)
        #[arg(long, default_value_t = 32)]
        key_size: usize,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Keygen { key_size } => return cmd_keygen(key_size),
        command => command,
    };

    let addr = match cli.addr {
        Some(addr) => addr,
        None => load_config(&cli.config).await?.daemon.listen,
    };
    let mut client = GatewayClient::connect(&addr).await?;
    run(&mut client, command, cli.hex).await
}

async fn run(client: &mut GatewayClient, command: Commands, hex_mode: bool) -> Result<()> {
    match command {
        Commands::Store { id, data } => {
            let key = client
                .store(&input(&id, hex_mode)?, &input(&data, hex_mode)?)
                .await?;
            println!("{}", hex::encode(key));
        }
        Commands::Retrieve { id, key } => {
            let key = hex::decode(&key).context("record key must be hex")?;
            let record = client.retrieve(&input(&id, hex_mode)?, &key).await?;
            println!("{}", output(record, hex_mode)?);
        }
        Commands::Delete { id } => {
            client.delete(&input(&id, hex_mode)?).await?;
            println!("deleted");
        }
        Commands::Keygen { key_size } => cmd_keygen(key_size)?,
    }
    Ok(())
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<SealgateConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(SealgateConfig::default())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn input(arg: &str, hex_input: bool) -> Result<Vec<u8>> {
    if hex_input {
        hex::decode(arg).with_context(|| format!("not valid hex: {arg}"))
    } else {
        Ok(arg.as_bytes().to_vec())
    }
}

fn output(record: Vec<u8>, hex_output: bool) -> Result<String> {
    if hex_output {
        return Ok(hex::encode(record));
    }
    String::from_utf8(record).context("record is not valid UTF-8; retry with --hex")
}

fn random_token(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn cmd_keygen(key_size: usize) -> Result<()> {
    anyhow::ensure!(
        sealgate_crypto::SUPPORTED_KEY_SIZES.contains(&key_size),
        "key size must be one of {:?}",
        sealgate_crypto::SUPPORTED_KEY_SIZES
    );
    println!("[crypto]");
    println!("id_key = \"{}\"", random_token(key_size));
    println!("id_nonce = \"{}\"", random_token(sealgate_crypto::NONCE_SIZE));
    Ok(())
}
