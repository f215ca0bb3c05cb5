//! FIX replay verifier entry point

use anyhow::Context;
use clap::Parser;
use config::{PlainSecret, VerifierConfig};
use fix_replay_verifier::{ServiceOptions, VerifierService};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Properties file
    #[arg(short, long)]
    config: PathBuf,

    /// Downstream server port (overrides `serverPort`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Downstream server bind address (overrides `serverBindAddress`)
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Replay messages from this file instead of the bus
    #[arg(long)]
    replay_file: Option<PathBuf>,

    /// Write every frame to this file as JSON lines
    #[arg(long)]
    output: Option<PathBuf>,

    /// Coordinator workers per stream (overrides `coordinatorWorkers`)
    #[arg(long)]
    workers: Option<usize>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(port) = self.port {
            overrides.push(("serverPort", port.to_string()));
        }
        if let Some(bind) = self.bind {
            overrides.push(("serverBindAddress", bind.to_string()));
        }
        if let Some(workers) = self.workers {
            overrides.push(("coordinatorWorkers", workers.to_string()));
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting FIX replay verifier");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fix_replay_verifier=info,fix_verifier=info,warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = VerifierConfig::load_with_overrides(&args.config, &args.overrides(), &PlainSecret)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    let options = ServiceOptions {
        replay_file: args.replay_file,
        output: args.output,
    };
    let running = VerifierService::new(config, options)
        .start()
        .await
        .context("startup failed")?;

    running
        .run_until(shutdown_signal())
        .await
        .context("verifier stopped on error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
