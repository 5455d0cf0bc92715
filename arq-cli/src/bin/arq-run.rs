//! ARQ Run - Simulated reliable transfer
//!
//! Pushes a workload through the ARQ sender/receiver pair over a simulated
//! lossy channel and reports what it took to get everything across.

use arq_cli::{display_compact_stats, display_report, RunConfig};
use arq_sim::Simulator;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "arq-run")]
#[command(about = "Run a reliable transfer over a simulated lossy channel", long_about = None)]
struct Args {
    /// Configuration file (TOML); flags below override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,

    /// Number of messages to send
    #[arg(short = 'n', long)]
    messages: Option<usize>,

    /// Size of each message in bytes
    #[arg(short = 's', long)]
    size: Option<usize>,

    /// Packet loss probability (0.0 to 1.0)
    #[arg(long)]
    loss: Option<f64>,

    /// Bit corruption probability (0.0 to 1.0)
    #[arg(long)]
    corrupt: Option<f64>,

    /// Duplication probability (0.0 to 1.0)
    #[arg(long)]
    duplicate: Option<f64>,

    /// One-way latency in milliseconds
    #[arg(long)]
    latency: Option<u64>,

    /// Maximum jitter in milliseconds (non-zero jitter reorders)
    #[arg(long)]
    jitter: Option<u64>,

    /// Channel RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Sender window size in packets
    #[arg(short, long)]
    window: Option<usize>,

    /// Retransmission timeout in milliseconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Compact one-line output instead of the full report
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    if args.example_config {
        print!("{}", RunConfig::example());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(n) = args.messages {
        config.workload.messages = n;
    }
    if let Some(size) = args.size {
        config.workload.message_size = size;
    }
    if let Some(loss) = args.loss {
        config.channel.loss_rate = loss;
    }
    if let Some(corrupt) = args.corrupt {
        config.channel.corrupt_rate = corrupt;
    }
    if let Some(duplicate) = args.duplicate {
        config.channel.duplicate_rate = duplicate;
    }
    if let Some(latency) = args.latency {
        config.channel.latency = Duration::from_millis(latency);
    }
    if let Some(jitter) = args.jitter {
        config.channel.jitter = Duration::from_millis(jitter);
    }
    if let Some(seed) = args.seed {
        config.channel.seed = seed;
    }
    if let Some(window) = args.window {
        config.protocol.window_size = window;
    }
    if let Some(timeout) = args.timeout {
        config.protocol.timeout = Duration::from_millis(timeout);
    }
    config.protocol.validate()?;

    if config.workload.message_size == 0 {
        anyhow::bail!("Message size must be non-zero");
    }

    tracing::info!(
        messages = config.workload.messages,
        size = config.workload.message_size,
        loss = config.channel.loss_rate,
        corrupt = config.channel.corrupt_rate,
        seed = config.channel.seed,
        "Starting run"
    );

    let mut sim = Simulator::new(config.protocol.clone(), config.channel.clone())?;

    let mut payload_bytes = 0u64;
    for i in 0..config.workload.messages {
        // Cycle the fill byte so misdelivery cannot go unnoticed
        let message = vec![(i % 251) as u8; config.workload.message_size];
        payload_bytes += message.len() as u64;
        sim.send_message(&message);
    }

    let limit = Duration::from_secs(config.workload.limit_secs);
    sim.run_until_idle(limit)?;
    sim.verify_delivery()?;

    let sender = sim.sender_stats();
    let receiver = sim.receiver_stats();
    let channel = sim.channel_stats();

    if args.quiet {
        display_compact_stats(sim.now(), &sender, &receiver);
    } else {
        display_report(sim.now(), payload_bytes, &sender, &receiver, &channel);
    }

    tracing::info!("All messages delivered intact and in order");
    Ok(())
}
