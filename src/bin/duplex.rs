//! Duplex voice endpoint
//!
//! Starts one side of the full-duplex link and hands control to a
//! small stdin loop: Enter cycles the active processor, `q` quits.

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duplex_voice::{
    audio::list_devices,
    config::{ProcessorKind, Role, SessionConfig},
    duplex::DuplexController,
    processor::load_chain,
};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = parse_args().context("invalid arguments")?;

    tracing::info!("Starting duplex voice endpoint ({:?})", config.role);

    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let kind = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        println!("  {} ({})", device.name, kind);
    }
    println!();

    // Model loading fails here, before any audio device is touched.
    let processors = load_chain(&config).context("failed to load processor chain")?;

    let mut controller =
        DuplexController::start(&config, processors).context("failed to start duplex session")?;

    println!("Press Enter to cycle processor, 'q' + Enter to quit.");
    println!("Active processor: {}\n", controller.active_processor_name());

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.unwrap_or_default();
        match line.trim() {
            "q" => break,
            "" => {
                let name = controller.cycle_processor().to_string();
                println!("Switched to: {name}");
            }
            other => {
                println!("Unknown command '{other}' (Enter = cycle, q = quit)");
            }
        }
    }

    tracing::info!("Stopping...");
    controller.stop();

    let stats = controller.stats();
    println!("\nSession statistics:");
    println!("  Packets sent:     {}", stats.packets_sent);
    println!("  Packets received: {}", stats.packets_received);
    println!("  Frames dropped:   {}", stats.frames_dropped);
    println!("  Silent frames:    {}", stats.silent_frames);

    Ok(())
}

/// Parse `duplex <caller|callee> <peer-ip> [options]`.
///
/// Options: `--send-port`, `--recv-port`, `--processor`, `--model`,
/// `--input`, `--output`, `--chunk-ms`, `--queue`.
fn parse_args() -> Result<SessionConfig> {
    let mut args = std::env::args().skip(1);

    let role = match args.next().as_deref() {
        Some("caller") => Role::Caller,
        Some("callee") => Role::Callee,
        other => bail!(
            "usage: duplex <caller|callee> <peer-ip> [options] (got role {:?})",
            other
        ),
    };

    let peer_address = args
        .next()
        .context("missing peer IP address")?
        .parse()
        .context("invalid peer IP address")?;

    // The caller sends on the low port and listens on the high one; the
    // callee mirrors that, so defaults pair up without flags.
    let (send_port, recv_port) = match role {
        Role::Caller => (5001, 5002),
        Role::Callee => (5002, 5001),
    };

    let mut config = SessionConfig {
        role,
        peer_address,
        send_port,
        recv_port,
        ..Default::default()
    };

    while let Some(flag) = args.next() {
        let mut value = || {
            args.next()
                .with_context(|| format!("missing value for {flag}"))
        };
        match flag.as_str() {
            "--send-port" => config.send_port = value()?.parse().context("invalid send port")?,
            "--recv-port" => config.recv_port = value()?.parse().context("invalid recv port")?,
            "--processor" => {
                config.processor = match value()?.as_str() {
                    "bypass" => ProcessorKind::Bypass,
                    "ai_denoiser" => ProcessorKind::AiDenoiser,
                    "classical" => ProcessorKind::Classical,
                    other => bail!("unknown processor '{other}'"),
                }
            }
            "--model" => config.denoiser_model = value()?,
            "--input" => config.input_device = Some(value()?),
            "--output" => config.output_device = Some(value()?),
            "--chunk-ms" => {
                config.chunk_duration_ms = value()?.parse().context("invalid chunk duration")?
            }
            "--queue" => {
                config.queue_capacity = value()?.parse().context("invalid queue capacity")?
            }
            other => bail!("unknown option '{other}'"),
        }
    }

    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(config)
}
