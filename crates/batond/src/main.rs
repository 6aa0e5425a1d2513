//! batond: the Baton daemon.
//!
//! Single binary that assembles the control scheduler, its eviction timer,
//! and the REST API.
//!
//! # Usage
//!
//! ```text
//! batond serve --config /etc/baton/baton.toml --port 8080
//! batond config --elevated-budget 15m
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use baton_core::BatonConfig;
use baton_scheduler::{Evictor, Scheduler, SchedulerConfig, SystemClock};

#[derive(Parser)]
#[command(name = "batond", about = "Baton exclusive-control daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler and serve the HTTP API.
    Serve(Overrides),
    /// Print the effective configuration as TOML and exit.
    Config(Overrides),
}

/// Settings that take precedence over the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Path to baton.toml. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "BATON_PORT")]
    port: Option<u16>,

    /// Session budget for standard clients, e.g. "100s".
    #[arg(long, env = "BATON_STANDARD_BUDGET")]
    standard_budget: Option<String>,

    /// Session budget for elevated clients, e.g. "10m".
    #[arg(long, env = "BATON_ELEVATED_BUDGET")]
    elevated_budget: Option<String>,

    /// Silence after which a client is considered gone, e.g. "15s".
    #[arg(long, env = "BATON_LIVENESS_TIMEOUT")]
    liveness_timeout: Option<String>,
}

impl Overrides {
    fn load(self) -> anyhow::Result<BatonConfig> {
        let mut config = match &self.config {
            Some(path) => BatonConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => BatonConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(self, config: &mut BatonConfig) {
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if self.standard_budget.is_some() {
            config.scheduler.standard_budget = self.standard_budget;
        }
        if self.elevated_budget.is_some() {
            config.scheduler.elevated_budget = self.elevated_budget;
        }
        if self.liveness_timeout.is_some() {
            config.scheduler.liveness_timeout = self.liveness_timeout;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,batond=debug,baton=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(overrides) => serve(overrides.load()?).await,
        Command::Config(overrides) => {
            let config = overrides.load()?;
            // Fail on the same values `serve` would reject.
            config.timings()?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: BatonConfig) -> anyhow::Result<()> {
    info!("Baton daemon starting");

    let timings = config.timings()?;
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::from(timings),
        Arc::new(SystemClock),
    )?);
    info!(
        standard_budget_s = timings.standard_budget.as_secs(),
        elevated_budget_s = timings.elevated_budget.as_secs(),
        liveness_timeout_s = timings.liveness_timeout.as_secs(),
        "scheduler initialized"
    );

    // ── Start background tasks ─────────────────────────────────

    let evictor = Evictor::new(scheduler.clone(), timings.tick_interval).spawn();

    // ── Start API server ───────────────────────────────────────

    let router = baton_api::build_router(scheduler);
    let addr = config.listen_addr();

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    server.await?;

    evictor.stop().await;

    info!("Baton daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed,
/// so the server keeps serving.
async fn shutdown_signal() {
    wait_for_interrupt(tokio::signal::ctrl_c()).await;
}

async fn wait_for_interrupt<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl-C handler, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
