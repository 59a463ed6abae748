//! Overlay Node - standalone binary for an origin, relay, PoP, or client.
//!
//! The three node roles share one `node` subcommand and one set of
//! background tasks; the role only decides which
//! [`overlay_core::NodeCapabilities`] are set (see `--role`). The `client`
//! subcommand is a distinct entry point: it has no `NodeCapabilities` of its
//! own and instead drives the end-client orchestrator directly.

mod config;
mod frame_source;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use overlay_core::{
    bootstrap_node, first_pop_with_catalogue, resolve_neighbours, run_client_frame_receiver,
    run_client_probe_loop, run_client_selector_loop, spawn_node_tasks, ClientConfig,
    EventEmitter, NeighbourTable, UpstreamSession, VideoSource,
};
use tokio::net::UdpSocket;
use tokio::signal;

use crate::config::{OverlayNodeFileConfig, Role};
use crate::frame_source::DirectoryFrameSource;

/// Overlay node binary — run a node (origin, relay, PoP) or an end-client.
#[derive(Parser, Debug)]
#[command(name = "overlay-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "OVERLAY_LOG_LEVEL", global = true)]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an overlay node (origin, relay, or PoP).
    Node(NodeArgs),
    /// Run an end-client that streams one video from a PoP.
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct NodeArgs {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Node role (overrides config file).
    #[arg(short, long, value_enum)]
    role: Option<Role>,

    /// Static neighbour IPs (overrides config file; resolved via bootstrap
    /// if neither this nor the config file's `neighbours` is set).
    #[arg(long = "ip", num_args = 1..)]
    ip: Vec<IpAddr>,

    /// Catalogue video names and their frame directories, as `name=path`
    /// (origin role only).
    #[arg(long = "video", num_args = 0..)]
    video: Vec<String>,

    /// Native frame rate for directory-backed video sources.
    #[arg(long, default_value = "30")]
    fps: f64,
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// PoP IPs to probe; the client subscribes through whichever scores best.
    #[arg(long = "ip", num_args = 1..)]
    ip: Vec<IpAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Overlay Node v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Node(args) => run_node(args).await,
        Command::Client(args) => run_client(args).await,
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let mut file_config =
        OverlayNodeFileConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(role) = args.role {
        file_config.role = role;
    }
    if !args.ip.is_empty() {
        file_config.neighbours = args.ip.clone();
    }

    let mut video_dirs = Vec::new();
    for entry in &args.video {
        let (name, path) = entry
            .split_once('=')
            .with_context(|| format!("--video entries must be `name=path`, got `{entry}`"))?;
        file_config.catalogue.push(name.to_string());
        video_dirs.push((name.to_string(), PathBuf::from(path)));
    }

    let neighbours = resolve_neighbours(
        file_config.neighbours.clone(),
        file_config.bootstrap_ip,
        file_config.bootstrap_port,
    )
    .await
    .context("failed to resolve neighbour list")?;

    log::info!(
        "role={:?} neighbours={:?} catalogue={:?}",
        file_config.role,
        neighbours,
        file_config.catalogue
    );

    let node_config = file_config.to_node_config(neighbours);
    let services = bootstrap_node(node_config).context("invalid node configuration")?;

    let fps = args.fps;
    let source_factory: Option<Arc<overlay_core::VideoSourceFactory>> = if video_dirs.is_empty() {
        None
    } else {
        Some(Arc::new(move |video: &str| -> Box<dyn VideoSource> {
            let dir = video_dirs
                .iter()
                .find(|(name, _)| name == video)
                .map(|(_, path)| path.clone())
                .unwrap_or_default();
            match DirectoryFrameSource::open(&dir, fps) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    log::error!("failed to open frame source for {video} at {dir:?}: {e}");
                    Box::new(FailingSource)
                }
            }
        }))
    };

    spawn_node_tasks(&services, source_factory)
        .await
        .context("failed to spawn node tasks")?;

    log::info!("node tasks started");

    shutdown_signal().await;

    log::info!("shutdown signal received, cleaning up...");
    services.shutdown();

    log::info!("shutdown complete");
    Ok(())
}

async fn run_client(args: ClientArgs) -> Result<()> {
    let config = ClientConfig {
        pops: args.ip,
        ..ClientConfig::default()
    };
    config.validate().map_err(anyhow::Error::msg)?;

    let emitter: Arc<dyn EventEmitter> = Arc::new(overlay_core::events::LoggingEventEmitter);
    let neighbours = Arc::new(NeighbourTable::new());
    let upstream = Arc::new(UpstreamSession::new());

    let probe_socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .context("failed to bind client probe socket")?;

    log::info!("probing PoPs for a catalogue: {:?}", config.pops);
    let choice = first_pop_with_catalogue(&probe_socket, &config.pops, config.rpc_port)
        .await
        .context("no configured PoP returned a non-empty catalogue")?;

    log::info!("PoP {} offers: {:?}", choice.pop, choice.videos);
    let video = prompt_video_choice(&choice.videos)?;
    log::info!("streaming '{video}', initial PoP {}", choice.pop);
    upstream.replace(choice.pop);

    tokio::spawn(run_client_probe_loop(
        probe_socket,
        config.pops.clone(),
        config.rpc_port,
        Arc::clone(&neighbours),
    ));

    tokio::spawn(run_client_selector_loop(
        Arc::clone(&neighbours),
        Arc::clone(&upstream),
        video.clone(),
        config.control_port,
        Arc::clone(&emitter),
    ));

    let heartbeat_socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .context("failed to bind client heartbeat socket")?;
    tokio::spawn(overlay_core::services::heartbeat::run_heartbeat_emitter(
        heartbeat_socket,
        Arc::clone(&upstream),
        config.heartbeat_port,
    ));

    let frame_socket = UdpSocket::bind(("0.0.0.0", config.streaming_port))
        .await
        .context("failed to bind client streaming port")?;
    tokio::spawn(run_client_frame_receiver(
        frame_socket,
        Arc::clone(&upstream),
        Arc::clone(&emitter),
        |video, frame| {
            log::debug!("received frame for '{video}' ({} bytes)", frame.len());
        },
    ));

    log::info!("client tasks started");
    shutdown_signal().await;
    log::info!("shutdown signal received, exiting");
    Ok(())
}

/// Interactively prompts the operator to pick one video by number, per
/// §4.5 ("video choice is a one-time interactive step at startup").
fn prompt_video_choice(videos: &[String]) -> Result<String> {
    for (i, video) in videos.iter().enumerate() {
        println!("  [{i}] {video}");
    }
    loop {
        print!("select a video by number: ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        if let Ok(index) = line.trim().parse::<usize>() {
            if let Some(video) = videos.get(index) {
                return Ok(video.clone());
            }
        }
        println!("invalid selection, try again");
    }
}

/// Placeholder source for a catalogue entry whose frame directory failed to
/// open; it never produces a frame, so the emitter task idles harmlessly
/// instead of the process refusing to start.
struct FailingSource;

#[async_trait::async_trait]
impl VideoSource for FailingSource {
    async fn next_frame(&mut self) -> std::io::Result<Vec<u8>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
