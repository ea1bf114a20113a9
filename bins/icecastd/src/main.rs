mod error;
mod http;
mod icy;
mod mux;
mod playlist;
mod source;

use anyhow::Context;
use clap::Parser;
use icecast_config::Config;
use icecast_ring::{ExportedCounters, RingBuffer, RingConfig};
use icecast_stream::{Broadcaster, StreamConfig};
use mux::ProducerMux;
use playlist::PlaylistProducer;
use source::SourceAcceptor;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Icecast-compatible audio distribution server: single live source,
/// playlist fallback, HTTP listener fan-out.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    config: String,

    /// Raise the default log level to DEBUG.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    init_tracing(cli.verbose || config.advanced.verbose_logging);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal error");
            if is_bind_failure(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn is_bind_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|io_err| io_err.kind() == std::io::ErrorKind::AddrInUse)
        .unwrap_or(false)
}

async fn run(config: Config) -> anyhow::Result<()> {
    let ring_config = RingConfig::from_mib(config.buffer.size_mb)
        .context("invalid buffer.size_mb slipped past config validation")?;
    let ring = Arc::new(RingBuffer::new(ring_config));
    let counters = Arc::new(ExportedCounters::new());

    let mux = ProducerMux::new(Arc::clone(&ring), Arc::clone(&counters));

    let sleep_low = Duration::from_secs_f64(config.broadcaster.sleep_low);
    let stream_config = StreamConfig {
        chunk_size: config.broadcaster.chunk_size,
        sleep_high: Duration::from_secs_f64(config.broadcaster.sleep_high),
        sleep_medium: Duration::from_secs_f64(config.broadcaster.sleep_medium),
        sleep_low,
        // `sleep_empty` has no TOML field (§6 only exposes high/medium/low);
        // derive it so `sleep_low <= sleep_empty` always holds regardless of
        // what the config sets, instead of hardwiring the default and letting
        // a spec-legal config fail `StreamConfig::validate`.
        sleep_empty: sleep_low.max(StreamConfig::default().sleep_empty),
        ..StreamConfig::default()
    };
    let broadcaster = Arc::new(
        Broadcaster::new(
            Arc::clone(&ring),
            config.advanced.max_listeners,
            stream_config,
            Arc::clone(&counters),
        )
        .context("invalid broadcaster configuration slipped past config validation")?,
    );
    let broadcaster_handle = Arc::clone(&broadcaster).spawn();

    let playlist = PlaylistProducer::scan(
        &config.playlist.directory,
        &config.playlist.extensions,
        config.playlist.shuffle,
        8 * 1024,
        Arc::clone(&ring),
        Arc::clone(&mux),
    )
    .await;
    let playlist_shutdown = playlist.shutdown_handle();
    let playlist_handle = playlist.spawn();

    let source_acceptor = SourceAcceptor::bind(
        &config.server.host,
        config.server.source_port,
        Arc::clone(&ring),
        Arc::clone(&mux),
        Arc::clone(&counters),
        config.server.source_password.clone(),
        Duration::from_secs(config.advanced.source_timeout),
    )
    .await
    .context("failed to bind source port")?;
    let source_handle = source_acceptor.spawn();

    let http_config = http::ListenerHttpConfig {
        mount_point: config.server.mount_point.clone(),
        enable_icy: config.metadata.enable_icy,
        icy_metaint: config.metadata.icy_metaint,
    };
    let app = http::router(Arc::clone(&broadcaster), Arc::clone(&mux), http_config);
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.listen_port))
        .await
        .context("failed to bind listen port")?;

    info!(
        mount = %config.server.mount_point,
        listen_port = config.server.listen_port,
        source_port = config.server.source_port,
        "icecastd ready"
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("HTTP server exited unexpectedly")?;
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    broadcaster.shutdown_signal().shutdown();
    playlist_shutdown.store(true, Ordering::Relaxed);
    source_handle.abort();
    let _ = broadcaster_handle.await;
    let _ = playlist_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
