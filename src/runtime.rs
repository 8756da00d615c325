// Mission runtime: load config and script, pick a hub, run to completion
//
// Ctrl-C trips the cancel token; the sequencer notices at its next poll tick,
// stops the drive and returns `Cancelled`, so the robot is never left running.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::RobotConfig;
use crate::error::{MissionError, Result};
use crate::hub::{Hub, SensorTrace, SimHub, ZenohHub};
use crate::mission::{MissionReport, MissionScript, MissionSequencer, scripts};
use crate::sensing::CancelToken;

#[derive(Debug, Clone)]
pub enum MissionSource {
    Challenge(u8),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: MissionSource,
    pub config: RobotConfig,
    pub simulate: bool,
    pub sensor_trace: Option<PathBuf>,
}

pub fn load_script(source: &MissionSource) -> Result<MissionScript> {
    let script = match source {
        MissionSource::Challenge(number) => scripts::challenge(*number).ok_or_else(|| {
            MissionError::Configuration(format!(
                "no built-in challenge {} (available: {:?})",
                number,
                scripts::CHALLENGES
            ))
        })?,
        MissionSource::File(path) => MissionScript::load(path)?,
    };
    script.validate()?;
    Ok(script)
}

async fn execute<H: Hub>(
    hub: H,
    config: RobotConfig,
    cancel: CancelToken,
    script: &MissionScript,
) -> Result<MissionReport> {
    let mut sequencer = MissionSequencer::new(hub, config, cancel);
    sequencer.initialize().await?;
    sequencer.run(script).await
}

pub async fn run(options: RunOptions) -> Result<MissionReport> {
    options.config.validate()?;
    let script = load_script(&options.source)?;

    let cancel = CancelToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, aborting mission");
            watcher.cancel();
        }
    });

    info!(
        "Mission '{}': {} steps, wheel circumference {} cm, poll {} ms",
        script.name,
        script.len(),
        options.config.wheel_circumference_cm,
        options.config.poll_interval_ms
    );

    if options.simulate {
        let hub = match &options.sensor_trace {
            Some(path) => SimHub::from_trace(SensorTrace::load(path)?),
            None => SimHub::new(),
        };
        info!("Running against simulated hub");
        execute(hub, options.config, cancel, &script).await
    } else {
        let hub = ZenohHub::open(&options.config).await?;
        execute(hub, options.config, cancel, &script).await
    }
}
