// Mission sequencer
//
// Executes a script strictly in order on one control timeline. Each step
// blocks until complete. Any error stops the drive train before it is
// propagated; there is no retry.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{ClawAction, MissionScript, MissionStep};
use crate::config::RobotConfig;
use crate::error::Result;
use crate::hub::Hub;
use crate::messages::MissionStatus;
use crate::motion::MotionPrimitives;
use crate::sensing::{CancelToken, SensorGate};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionReport {
    /// Steps executed, branch steps included, skipped branch arms excluded
    pub steps: usize,
    /// Outcome of every branch evaluated, in order
    pub branches: Vec<bool>,
    pub elapsed: Duration,
}

pub struct MissionSequencer<H: Hub> {
    drive: MotionPrimitives<H>,
    gate: SensorGate,
}

impl<H: Hub> MissionSequencer<H> {
    pub fn new(hub: H, config: RobotConfig, cancel: CancelToken) -> Self {
        let gate = SensorGate::from_config(&config, cancel);
        Self {
            drive: MotionPrimitives::new(hub, config),
            gate,
        }
    }

    /// Pair the drive motors and announce the runtime as idle
    pub async fn initialize(&mut self) -> Result<()> {
        self.drive.initialize().await?;
        self.publish(MissionStatus::Idle).await;
        Ok(())
    }

    pub fn drive(&self) -> &MotionPrimitives<H> {
        &self.drive
    }

    async fn publish(&mut self, status: MissionStatus) {
        if let Err(e) = self.drive.hub_mut().report_status(&status).await {
            warn!("Failed to publish mission status: {}", e);
        }
    }

    /// Run a whole script. On failure the drive is stopped and the error returned.
    pub async fn run(&mut self, script: &MissionScript) -> Result<MissionReport> {
        script.validate()?;
        info!("Starting mission '{}' ({} steps)", script.name, script.len());
        self.publish(MissionStatus::Running {
            mission: script.name.clone(),
        })
        .await;

        let started = Instant::now();
        let mut report = MissionReport::default();
        let result = self.execute_all(&script.steps, &mut report).await;
        report.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                info!(
                    "Mission '{}' completed: {} steps in {:?}",
                    script.name, report.steps, report.elapsed
                );
                self.publish(MissionStatus::Completed {
                    mission: script.name.clone(),
                    steps: report.steps,
                })
                .await;
                Ok(report)
            }
            Err(e) => {
                warn!("Mission '{}' aborted at step {}: {}", script.name, report.steps, e);
                if let Err(stop_err) = self.drive.stop().await {
                    warn!("Failed to stop drive after abort: {}", stop_err);
                }
                self.publish(MissionStatus::Aborted {
                    mission: script.name.clone(),
                    reason: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn execute_all(&mut self, steps: &[MissionStep], report: &mut MissionReport) -> Result<()> {
        // Branch arms are pushed as frames; when an arm runs out control
        // falls back to the step after the branch
        let mut frames = vec![steps.iter()];
        while let Some(frame) = frames.last_mut() {
            let Some(step) = frame.next() else {
                frames.pop();
                continue;
            };
            report.steps += 1;

            if let MissionStep::Branch {
                when,
                then,
                otherwise,
            } = step
            {
                let config = self.drive.config();
                let (color_port, distance_port) = (config.color_sensor, config.distance_sensor);
                // One snapshot, never re-sampled
                let taken = when.evaluate(self.drive.hub_mut(), color_port, distance_port)?;
                info!("Step {}: branch {:?} -> {}", report.steps, when, taken);
                report.branches.push(taken);
                frames.push(if taken { then.iter() } else { otherwise.iter() });
                continue;
            }

            info!("Step {}: {:?}", report.steps, step);
            self.execute(step).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, step: &MissionStep) -> Result<()> {
        if self.gate.cancel_token().is_cancelled() {
            return Err(crate::error::MissionError::Cancelled);
        }
        match step {
            MissionStep::Move(command) => self.drive.execute(command, &self.gate).await,
            MissionStep::Wait(condition) => {
                let config = self.drive.config().clone();
                self.gate
                    .wait_for(condition, self.drive.hub_mut(), &config)
                    .await
                    .map(|_| ())
            }
            MissionStep::FollowLine(follower) => {
                follower.run(&mut self.drive, &self.gate).await.map(|_| ())
            }
            MissionStep::Pause(ms) => self.gate.pause(Duration::from_millis(*ms)).await,
            MissionStep::Claw(ClawAction::Raise { degrees, velocity }) => {
                self.drive.raise_claw(*degrees, *velocity).await
            }
            MissionStep::Claw(ClawAction::Lower { degrees, velocity }) => {
                self.drive.lower_claw(*degrees, *velocity).await
            }
            // Handled in execute_all
            MissionStep::Branch { .. } => Ok(()),
        }
    }
}
