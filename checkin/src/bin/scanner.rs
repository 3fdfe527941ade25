//! Scanning station.
//!
//! Reads lines from stdin and feeds them into one [`ScanSession`] that posts
//! accepted attempts to a check-in server:
//!
//! - `GENERAL|ABC123` - a decoded camera frame (subject to the cooldown)
//! - `!GENERAL|ABC123` - a manual submission (skips the duplicate check)
//!
//! Piping a camera decoder's output into this binary gives a complete
//! station; every outcome is printed with its operator message.
//!
//! # Usage
//!
//! ```bash
//! SCANNER_SERVER_URL=http://localhost:8080 SCANNER_DEVICE_ID=gate-a \
//!   cargo run --bin scanner
//! ```

use anyhow::Context;
use checkin::config::Config;
use checkin::intake::{HttpDispatcher, ScanAction, ScanEnvironment, ScanOutcome, ScanSession};
use checkin::types::DeviceId;
use gatecheck_core::environment::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MANUAL_PREFIX: char = '!';

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let scanner = &config.scanner;

    let dispatcher = HttpDispatcher::new(&scanner.server_url, scanner.request_timeout())
        .context("Failed to build HTTP client")?;
    info!(
        endpoint = dispatcher.endpoint(),
        device = %scanner.device_id,
        cooldown_ms = scanner.cooldown_ms,
        "Scanning station ready"
    );

    let environment = ScanEnvironment::new(Arc::new(SystemClock), Arc::new(dispatcher))
        .with_cooldown(scanner.cooldown());
    let session = ScanSession::new(DeviceId::new(&scanner.device_id), environment);

    let (stop_printer, stop) = oneshot::channel();
    let printer = tokio::spawn(print_outcomes(session.subscribe(), stop));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let sent = match line.strip_prefix(MANUAL_PREFIX) {
            Some(code) => session.submit_manual(code).await,
            None => session.frame_decoded(line).await,
        };
        sent.context("Scan session stopped")?;
    }

    info!(pending = session.pending(), "Input closed, waiting for outstanding attempts");
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    if let Err(error) = session.shutdown(grace).await {
        warn!(%error, "Attempts still running at exit");
    }
    let _ = stop_printer.send(());
    if let Err(error) = printer.await {
        warn!(%error, "Outcome display stopped abnormally");
    }

    let counters = session.counters().await;
    info!(
        forwarded = counters.forwarded,
        suppressed_in_flight = counters.suppressed_in_flight,
        suppressed_duplicate = counters.suppressed_duplicate,
        "Scanning station stopped"
    );
    Ok(())
}

/// Print outcomes until `stop` fires, then flush what was already broadcast.
async fn print_outcomes(
    mut actions: broadcast::Receiver<ScanAction>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            received = actions.recv() => match received {
                Ok(ScanAction::AttemptCompleted { outcome, .. }) => print_outcome(&outcome),
                Ok(_) => {},
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Outcome display lagged"),
                Err(RecvError::Closed) => return,
            },
            _ = &mut stop => break,
        }
    }

    while let Ok(action) = actions.try_recv() {
        if let ScanAction::AttemptCompleted { outcome, .. } = action {
            print_outcome(&outcome);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_outcome(outcome: &ScanOutcome) {
    let label = match outcome {
        ScanOutcome::Completed { result } if result.is_success() => "OK  ",
        ScanOutcome::Completed { .. } => "DENY",
        ScanOutcome::Unavailable { .. } => "RETRY",
    };
    let reason = outcome
        .result()
        .and_then(|r| r.reason())
        .map(|r| format!(" [{r}]"))
        .unwrap_or_default();
    println!("{label}{reason} {}", outcome.message());
}
