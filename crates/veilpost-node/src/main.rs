//! Veilpost command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create alice.pub.json and alice.key.json
//! veilpost keygen --out alice
//!
//! # Seal a file for alice
//! veilpost seal --to alice.pub.json --from bob.key.json --input note.txt --output note.env
//!
//! # Open it
//! veilpost open --key alice.key.json --input note.env
//!
//! # Show envelope metadata without decrypting
//! veilpost inspect --input note.env
//! ```
//!
//! Each invocation is a fresh process with no cached sessions, so `seal`
//! always produces cold-start envelopes and `open` accepts only those.

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use veilpost_core::SenderContext;
use veilpost_node::{
    EnvelopeFormat, EnvelopeSummary, Node, NodeConfig, NodeError, decode_envelope,
    encode_envelope, load_keypair, load_public_identity, save_keypair,
};

/// Hybrid post-quantum envelope encryption
#[derive(Parser, Debug)]
#[command(name = "veilpost")]
#[command(about = "Seal and open ML-KEM-1024 + ChaCha20-Poly1305 envelopes")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Concurrent seal/open jobs (defaults to available parallelism)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Age in seconds after which an opened envelope is reported as stale
    #[arg(long, default_value_t = 24 * 60 * 60, global = true)]
    stale_after_secs: u64,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        let mut config = NodeConfig::default();
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.core.staleness_window = Duration::from_secs(self.stale_after_secs);
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a keypair and write `<OUT>.pub.json` and `<OUT>.key.json`
    Keygen {
        /// Base path for the key files
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Encrypt for a recipient
    Seal {
        /// Recipient public key file
        #[arg(long)]
        to: PathBuf,

        /// Sender key file
        #[arg(long)]
        from: PathBuf,

        /// Plaintext file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Envelope file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Envelope form
        #[arg(long, value_enum, default_value_t)]
        format: EnvelopeFormat,
    },

    /// Decrypt an envelope addressed to this key
    Open {
        /// Recipient key file
        #[arg(short, long)]
        key: PathBuf,

        /// Envelope file, JSON or binary (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Plaintext file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print envelope metadata. Nothing is decrypted or verified.
    Inspect {
        /// Envelope file, JSON or binary (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

fn read_input(path: Option<&Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        },
    }
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, bytes),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        },
    }
}

async fn run(command: Command, node: &Node) -> Result<(), NodeError> {
    match command {
        Command::Keygen { out } => {
            let keypair = node.generate_keypair().await?;
            let paths = save_keypair(&keypair, &out)?;
            let report = format!(
                "key id {}\npublic {}\nsecret {}\n",
                keypair.key_id(),
                paths.public.display(),
                paths.secret.display()
            );
            write_output(None, report.as_bytes())?;
        },
        Command::Seal { to, from, input, output, format } => {
            let recipient = load_public_identity(&to)?;
            let sender = SenderContext::for_keypair(&load_keypair(&from)?);
            let plaintext = read_input(input.as_deref())?;

            let envelope = node.seal(plaintext, recipient, sender).await?;
            write_output(output.as_deref(), &encode_envelope(&envelope, format)?)?;
        },
        Command::Open { key, input, output } => {
            let keypair = Arc::new(load_keypair(&key)?);
            let envelope = decode_envelope(&read_input(input.as_deref())?)?;

            let opened = node.open(envelope, keypair).await?;
            if opened.stale {
                tracing::warn!(sender = %opened.sender_key_id, "envelope is older than the staleness window");
            }
            write_output(output.as_deref(), &opened.plaintext)?;
        },
        Command::Inspect { input } => {
            let envelope = decode_envelope(&read_input(input.as_deref())?)?;
            let mut json = serde_json::to_vec_pretty(&EnvelopeSummary::of(&envelope))
                .map_err(io::Error::from)?;
            json.push(b'\n');
            write_output(None, &json)?;
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let mut node = Node::start(args.node_config());
    let result = run(args.command, &node).await;
    node.shutdown();

    if let Err(NodeError::Core(core)) = &result {
        tracing::error!(fatal = core.is_fatal(), "{}", core.user_message());
    }
    Ok(result?)
}
