//! Exam Gate - headless kiosk host
//!
//! Drives the gate controller from the command line the way a kiosk shell
//! would: start-up and background polling refresh the status, passwords typed
//! on stdin are verified, and state changes are logged.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exam_gate_lib::{
    FileStore, GateConfig, GateController, HttpGateApi, LifecycleEvent, VerifyOutcome,
};

#[derive(Parser)]
#[command(name = "exam-gate", version, about = "Remote-gated exam kiosk session")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the gate status once and print the resulting state
    Status,
    /// Submit an unlock password
    Verify { password: String },
    /// Lock the gate locally
    Lock,
    /// Keep polling the backend and verify passwords read from stdin
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,exam_gate=debug,exam_gate_lib=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GateConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GateConfig::load().context("loading config")?,
    };

    tracing::info!(
        "Starting Exam Gate v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.api_base_url
    );

    let store = match &config.store_path {
        Some(path) => FileStore::new(path),
        None => FileStore::open_default().context("locating store")?,
    };
    let api = HttpGateApi::new(&config).context("building HTTP client")?;
    let controller = Arc::new(
        GateController::new(Arc::new(store), Arc::new(api))
            .with_request_timeout(config.request_timeout()),
    );

    match cli.command {
        Command::Status => {
            controller.handle_lifecycle(LifecycleEvent::Started).await;
            print_state(&controller)?;
        }
        Command::Verify { password } => {
            controller.initialize();
            let outcome = controller.verify(&password).await;
            print_state(&controller)?;
            if outcome == VerifyOutcome::Rejected {
                anyhow::bail!("Password rejected");
            }
        }
        Command::Lock => {
            controller.initialize();
            controller.lock();
            print_state(&controller)?;
        }
        Command::Run => run(controller, &config).await?,
    }

    Ok(())
}

fn print_state(controller: &GateController) -> anyhow::Result<()> {
    let state = controller.state();
    let report = serde_json::json!({
        "phase": state.phase(),
        "screen": state.screen(),
        "content_url": state.content_url(),
        "state": state,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(controller: Arc<GateController>, config: &GateConfig) -> anyhow::Result<()> {
    let mut rx = controller.subscribe();
    let watcher = tokio::spawn(async move {
        let mut last = None;
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            let view = (state.screen(), state.content_url());
            if last.as_ref() != Some(&view) {
                tracing::info!(
                    "Screen {:?} (phase {:?}, content {:?})",
                    view.0,
                    state.phase(),
                    view.1
                );
                last = Some(view);
            }
        }
    });

    controller.handle_lifecycle(LifecycleEvent::Started).await;

    let poller = config.poll_interval().map(|interval| {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately and start-up already refreshed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                controller.refresh_status().await;
            }
        })
    });

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    match controller.verify(line.trim_end_matches('\r')).await {
                        VerifyOutcome::Unlocked => tracing::info!("Password accepted"),
                        VerifyOutcome::Rejected => tracing::warn!("Wrong password"),
                    }
                }
                None => {
                    tracing::debug!("stdin closed, no further passwords");
                    stdin_open = false;
                }
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down, locking gate");
                controller.handle_lifecycle(LifecycleEvent::Paused).await;
                break;
            }
        }
    }

    if let Some(poller) = poller {
        poller.abort();
    }
    watcher.abort();
    Ok(())
}
