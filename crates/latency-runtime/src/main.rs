//! # latency-runtime
//!
//! Command line entry point.
//!
//! - `run`: wire both transports, run batches, print the statistics table
//! - `ping`: one ad-hoc probe per transport
//! - `reverse`: one probe started by the channel responder, split into legs
//! - `serve`: standalone WebSocket responder for a second process

use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use latency_harness::adapters::SocketResponder;
use latency_bus::EventPublisher;
use latency_harness::{HarnessApi, ResponderConfig};
use latency_runtime::report::{render_activity, render_legs, render_statistics, BatchOutcome};
use latency_runtime::{LatencyRuntime, RuntimeConfig};
use latency_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use latency_types::{BatchMode, TransportKind};

/// Round-trip latency harness: message channel vs WebSocket
#[derive(Parser, Debug)]
#[command(name = "latency-runtime")]
#[command(about = "Compare round-trip latency of a message channel and a WebSocket")]
struct Cli {
    /// Log level filter (overrides LATENCY_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run batches and print statistics
    Run(RunArgs),
    /// Send one probe per transport
    Ping(PingArgs),
    /// Have the channel responder start one probe and show its legs
    Reverse(ReverseArgs),
    /// Serve WebSocket echoes until Ctrl+C
    Serve(ServeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum TransportChoice {
    Channel,
    Socket,
    Both,
}

impl TransportChoice {
    fn kinds(self) -> Vec<TransportKind> {
        match self {
            Self::Channel => vec![TransportKind::ChannelBased],
            Self::Socket => vec![TransportKind::SocketBased],
            Self::Both => TransportKind::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeChoice {
    Sequential,
    Concurrent,
}

impl From<ModeChoice> for BatchMode {
    fn from(mode: ModeChoice) -> Self {
        match mode {
            ModeChoice::Sequential => BatchMode::Sequential,
            ModeChoice::Concurrent => BatchMode::Concurrent,
        }
    }
}

/// Flags shared by `run` and `ping`.
#[derive(Args, Debug)]
struct ConnectArgs {
    /// Transports to exercise
    #[arg(short, long, value_enum, default_value = "both")]
    transport: TransportChoice,

    /// Responder processing delay in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Connect to an external WebSocket responder instead of spawning one
    #[arg(long, env = "LATENCY_SOCKET_URL")]
    socket_url: Option<String>,

    /// Address for the in-process WebSocket responder
    #[arg(long, env = "LATENCY_WS_ADDR")]
    ws_addr: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Probes per batch
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,

    /// Batch mode
    #[arg(short, long, value_enum, default_value = "sequential")]
    mode: ModeChoice,

    /// Run the batches this many times
    #[arg(long, default_value = "1")]
    rounds: NonZeroUsize,

    /// Stop or restart the in-process WebSocket responder after every N rounds
    #[arg(long)]
    toggle_every: Option<NonZeroUsize>,

    /// Give up on a probe after this many milliseconds (0 waits forever)
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[derive(Args, Debug)]
struct PingArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Probe message text
    #[arg(long, default_value = "ping")]
    message: String,

    /// Seconds to wait for each response
    #[arg(long, default_value_t = 5)]
    wait_secs: u64,
}

#[derive(Args, Debug)]
struct ReverseArgs {
    /// Probe message text
    #[arg(long, default_value = "Message from the responder")]
    message: String,

    /// Seconds to wait for the answer
    #[arg(long, default_value_t = 5)]
    wait_secs: u64,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address
    #[arg(long, env = "LATENCY_WS_ADDR", default_value = latency_runtime::config::DEFAULT_WS_ADDR)]
    addr: String,

    /// Processing delay in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

/// Environment configuration with CLI flags applied on top.
fn load_config(connect: &ConnectArgs) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_env().context("Invalid LATENCY_* environment")?;

    config.transports = connect.transport.kinds();
    if let Some(ms) = connect.delay_ms {
        config.responder.processing_delay = Duration::from_millis(ms);
    }
    if let Some(addr) = &connect.ws_addr {
        config.ws_addr = addr.clone();
    }
    if let Some(url) = &connect.socket_url {
        config.socket_url = Some(url.clone());
        config.spawn_responders = false;
    }

    Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(&args.connect)?;
    if let Some(ms) = args.probe_timeout_ms {
        config.harness.probe_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    let mut runtime = LatencyRuntime::start(config).await?;
    let mode = BatchMode::from(args.mode);
    let transports = runtime.config().transports.clone();
    let rounds = args.rounds.get();

    'rounds: for round in 1..=rounds {
        for &transport in &transports {
            let outcome: Result<BatchOutcome> = {
                let batch = runtime.run_batch(transport, args.count, mode);
                tokio::pin!(batch);

                tokio::select! {
                    outcome = &mut batch => outcome,
                    _ = tokio::signal::ctrl_c() => {
                        warn!(transport = %transport, "Interrupted, aborting batch");
                        runtime.harness().abort_batch().context("Failed to abort batch")?;
                        let outcome = batch.await?;
                        println!("{}", outcome.render());
                        break 'rounds;
                    }
                }
            };
            match outcome {
                Ok(outcome) => println!("{}", outcome.render()),
                // A stopped responder makes its transport unavailable.
                Err(e) => println!("{transport} batch not run: {e:#}"),
            }
        }

        let toggle_due = args
            .toggle_every
            .is_some_and(|every| round % every.get() == 0 && round < rounds);
        if toggle_due {
            let running = runtime.toggle_socket_server().await?;
            println!(
                "WebSocket responder {}",
                if running { "restarted" } else { "stopped" }
            );
        }
    }

    println!();
    print!("{}", render_statistics(&runtime.harness().statistics()));
    println!(
        "{}",
        render_activity(&runtime.harness().pending_stats(), runtime.bus().events_published())
    );

    if args.metrics {
        println!();
        print!("{}", encode_metrics().context("Failed to encode metrics")?);
    }

    runtime.shutdown().await;
    Ok(())
}

async fn ping(args: PingArgs) -> Result<()> {
    let config = load_config(&args.connect)?;
    let runtime = LatencyRuntime::start(config).await?;
    let wait = Duration::from_secs(args.wait_secs);

    for transport in runtime.config().transports.clone() {
        let elapsed = runtime.ping(transport, &args.message, wait).await?;
        println!("{transport}: {elapsed:.3} ms");
    }

    runtime.shutdown().await;
    Ok(())
}

async fn reverse(args: ReverseArgs) -> Result<()> {
    let mut config = RuntimeConfig::from_env().context("Invalid LATENCY_* environment")?;
    config.transports = vec![TransportKind::ChannelBased];

    let runtime = LatencyRuntime::start(config).await?;
    let legs = runtime
        .reverse_probe(&args.message, Duration::from_secs(args.wait_secs))
        .await?;
    println!("{}: {}", TransportKind::ChannelBased, render_legs(&legs));

    runtime.shutdown().await;
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut responder = ResponderConfig::from_env().context("Invalid LATENCY_* environment")?;
    if let Some(ms) = args.delay_ms {
        responder.processing_delay = Duration::from_millis(ms);
    }

    let handle = SocketResponder::new(responder)
        .bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;

    info!(url = %handle.url(), "Responder is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    handle.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = cli.log_level {
        telemetry = telemetry.with_log_level(level);
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Ping(args) => ping(args).await,
        Command::Reverse(args) => reverse(args).await,
        Command::Serve(args) => serve(args).await,
    }
}
