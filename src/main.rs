use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spike_mission_runtime::config::RobotConfig;
use spike_mission_runtime::error::MissionError;
use spike_mission_runtime::runtime::{self, MissionSource, RunOptions};

/// Run a challenge mission on the SPIKE robot
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Built-in challenge number (1, 2, 3, 5, 6, 7)
    #[arg(short, long, conflicts_with = "script", required_unless_present = "script")]
    mission: Option<u8>,

    /// Mission script as JSON
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Robot configuration as JSON (defaults apply otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against the simulated hub instead of the Zenoh bridge
    #[arg(long)]
    simulate: bool,

    /// Scripted sensor samples for the simulated hub
    #[arg(long, requires = "simulate")]
    sensor_trace: Option<PathBuf>,

    /// Abort any sensor wait that takes longer than this
    #[arg(long)]
    wait_timeout_ms: Option<u64>,

    /// Print the resolved script as JSON and exit
    #[arg(long)]
    print_script: bool,
}

async fn run(args: Args) -> Result<(), MissionError> {
    let mut config = match &args.config {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };
    if args.wait_timeout_ms.is_some() {
        config.wait_timeout_ms = args.wait_timeout_ms;
    }

    let source = match (args.mission, args.script) {
        (_, Some(path)) => MissionSource::File(path),
        (Some(number), None) => MissionSource::Challenge(number),
        (None, None) => {
            return Err(MissionError::Configuration(
                "either --mission or --script is required".to_string(),
            ));
        }
    };

    if args.print_script {
        let script = runtime::load_script(&source)?;
        println!("{}", serde_json::to_string_pretty(&script)?);
        return Ok(());
    }

    let report = runtime::run(RunOptions {
        source,
        config,
        simulate: args.simulate,
        sensor_trace: args.sensor_trace,
    })
    .await?;
    info!(
        "Done: {} steps, branches {:?}, {:?}",
        report.steps, report.branches, report.elapsed
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Mission error: {}", e);
        std::process::exit(1);
    }
}
