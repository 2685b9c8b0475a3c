use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pktwatch::config::{CliArgs, Config};
use pktwatch::exit::{codes, exit_code};
use pktwatch::iface::SystemResolver;
use pktwatch::poll::LogSink;
use pktwatch::privilege::ensure_capability;
use pktwatch::program::AyaLoader;
use pktwatch::shutdown::ShutdownSignal;
use pktwatch::{Agent, AgentError};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => codes::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            exit_code(&e)
        }
    };
    // Every resource lives inside `run`, so nothing is left to drop here.
    std::process::exit(code);
}

async fn run() -> Result<(), AgentError> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = match cli.config {
        Some(ref config_path) => Config::from_file(config_path).map_err(|e| {
            AgentError::Config(format!("{}: {e:#}", config_path.display()))
        }),
        None => Ok(Config::default()),
    };
    if let Ok(config) = config.as_mut() {
        config.merge_cli(&cli);
    }

    // Logging.
    let quiet = config.as_ref().is_ok_and(|c| c.quiet);
    let filter = if quiet {
        tracing_subscriber::EnvFilter::new("error")
    } else {
        tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        )
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config?;

    // ── Kernel setup ──────────────────────────────────────────────────
    ensure_capability()?;
    let shutdown = ShutdownSignal::install()?;
    let loader = AyaLoader::new(config.program_path.clone(), config.xdp_mode);
    tracing::debug!("loading inspection program from {}", loader.path().display());
    let mut agent = Agent::start(&config, &loader, &SystemResolver)?;

    // ── Poll until signalled ──────────────────────────────────────────
    let sink = LogSink::new(agent.key());
    let summary = agent.run(sink, shutdown.recv()).await;
    drop(agent);

    tracing::debug!("stopped after {} ticks", summary.ticks);
    Ok(())
}
