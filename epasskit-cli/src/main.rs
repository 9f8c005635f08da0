//! `epasskit` developer CLI.
//!
//! Runs a scan session against simulated platform capabilities and decodes raw reader
//! events, for exercising the session without a device.

mod logging;
mod simulator;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use epasskit_core::{
    classify_read_error, NotificationThrottle, ScanEventBus, ScanSession, ScanSignal,
    SessionConfig,
};
use eyre::{Context, Result};
use serde_json::json;

use simulator::{
    ConsoleObserver, ConsoleToaster, LineParser, Scenario, SimulatedCodec, SimulatedReader,
};

#[derive(Parser)]
#[command(name = "epasskit", version, about = "ePassKit developer CLI")]
struct Cli {
    /// Log the library's debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs initialize, MRZ capture and chip read against a simulated document.
    Simulate(SimulateArgs),
    /// Decodes a raw platform reader event and shows how the session would treat it.
    Event {
        /// Event name, e.g. `onPassportReadError`.
        name: String,
        /// JSON payload of the event.
        payload: Option<String>,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// How the simulated document behaves.
    #[arg(long, value_enum, default_value = "success")]
    scenario: Scenario,

    /// JSON session configuration file.
    #[arg(long, env = "EPASSKIT_CONFIG")]
    config: Option<PathBuf>,

    /// License token passed to the reader.
    #[arg(long, env = "EPASSKIT_LICENSE", default_value = "developer")]
    license: String,

    /// Delay between simulated reader steps.
    #[arg(long, default_value_t = 150)]
    step_delay_ms: u64,

    /// Try the chip read this many times, as a user tapping "retry" would.
    #[arg(long, default_value_t = 1)]
    attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Simulate(args) => simulate(args).await,
        Command::Event { name, payload } => decode_event(&name, payload.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    Ok(SessionConfig::from_json(&json)?)
}

async fn simulate(args: SimulateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    tracing::debug!("session config: {config:?}");

    let bus = Arc::new(ScanEventBus::new());
    let toaster = Arc::new(ConsoleToaster::default());
    let reader = Arc::new(SimulatedReader::new(
        bus.clone(),
        args.scenario,
        Duration::from_millis(args.step_delay_ms),
        config.total_nfc_steps,
    ));
    let notifier = Arc::new(NotificationThrottle::new(toaster.clone(), config.clone()));
    let session = ScanSession::new(
        reader,
        Arc::new(LineParser),
        Arc::new(SimulatedCodec {
            fail: args.scenario == Scenario::ImageFailure,
        }),
        notifier,
        bus,
        config,
    );
    session.set_observer(Arc::new(ConsoleObserver));

    session.initialize(args.license).await?;
    let credentials = session.capture_mrz().await?;
    tracing::info!("MRZ captured: {credentials:?}");

    let mut outcome = Vec::new();
    for attempt in 1..=args.attempts.max(1) {
        match session.capture_nfc().await {
            Ok(result) => {
                outcome.push(json!({ "attempt": attempt, "verified": result.verified }));
                break;
            }
            Err(e) => outcome.push(json!({ "attempt": attempt, "error": e.to_string() })),
        }
    }

    let result = session.verification_result();
    let report = json!({
        "scenario": format!("{:?}", args.scenario),
        "attempts": outcome,
        "snapshot": session.snapshot(),
        "fields": result.as_ref().map(|r| &r.fields),
        "portrait": result.as_ref().and_then(epasskit_core::VerificationResult::portrait_data_uri),
        "notifications": toaster.shown(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    session.shutdown().await;
    Ok(())
}

fn decode_event(name: &str, payload: Option<&str>) -> Result<()> {
    let signal = ScanSignal::from_platform_event(name, payload)?;

    let effect = match &signal {
        ScanSignal::Progress { step } => format!("progress step {step}"),
        ScanSignal::ReadError {
            kind,
            exception,
            message,
        } => format!(
            "read error classified as {:?}",
            classify_read_error(kind.as_deref(), exception.as_deref(), message.as_deref())
        ),
        ScanSignal::MrzInvalid => "aborts the running chip read".to_string(),
    };

    println!("{signal:?}\n{effect}");
    Ok(())
}
