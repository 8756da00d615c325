// Two-state line follower
//
// Hugs a line edge with a bang-bang controller: every tick samples the color
// sensor once and commands one of two fixed tank power pairs depending on
// whether the sample is the line color. The resulting zig-zag keeps the sensor
// oscillating across the boundary. No proportional term.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{HubError, MissionError, Result};
use crate::hub::{Color, Hub};
use crate::motion::{MotionPrimitives, Side, TankPower};
use crate::sensing::{SensorGate, drive_motor};

/// When the follower hands control back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// The tick's sample equals this color
    UntilColorReached(Color),
    /// |relative position| of a drive motor, reset when following starts
    UntilEncoderAbs { motor: Side, degrees: i32 },
    /// Number of on-line -> off-line transitions
    Cycles(u32),
    /// Only cancellation or the gate deadline ends the loop
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    OnTargetColor,
    OffTargetColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFollower {
    pub line_color: Color,
    /// Commanded while the sensor sees the line
    pub on_power: TankPower,
    /// Commanded while it does not
    pub off_power: TankPower,
    pub stop: StopCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowReport {
    pub ticks: u32,
    pub transitions: u32,
    pub cycles: u32,
}

impl LineFollower {
    pub fn new(line_color: Color, on_power: TankPower, off_power: TankPower, stop: StopCondition) -> Self {
        Self {
            line_color,
            on_power,
            off_power,
            stop,
        }
    }

    /// Follower whose off-line power is the mirror of the on-line power
    pub fn symmetric(line_color: Color, on_power: TankPower, stop: StopCondition) -> Self {
        Self::new(line_color, on_power, on_power.mirrored(), stop)
    }

    pub fn validate(&self) -> Result<()> {
        match self.stop {
            StopCondition::UntilColorReached(color) if color == self.line_color => {
                Err(MissionError::Configuration(format!(
                    "follower stop color {:?} is the line color",
                    color
                )))
            }
            StopCondition::UntilEncoderAbs { degrees, .. } if degrees <= 0 => Err(
                MissionError::Configuration(format!("encoder budget must be positive, got {}", degrees)),
            ),
            StopCondition::Cycles(0) => Err(MissionError::Configuration(
                "follower cycle count must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn power(&self, state: FollowState) -> TankPower {
        match state {
            FollowState::OnTargetColor => self.on_power,
            FollowState::OffTargetColor => self.off_power,
        }
    }

    /// Run until the stop condition holds, then stop the drive exactly once
    pub async fn run<H: Hub>(
        &self,
        drive: &mut MotionPrimitives<H>,
        gate: &SensorGate,
    ) -> Result<FollowReport> {
        info!(
            "Following {:?} line, on={:?} off={:?}, stop {:?}",
            self.line_color, self.on_power, self.off_power, self.stop
        );
        let mut report = FollowReport::default();
        let followed = self.follow(drive, gate, &mut report).await;
        let stopped = drive.stop().await;

        match (followed, stopped) {
            (Err(e), Err(stop_err)) => {
                warn!("Failed to stop after follower error: {}", stop_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(stop_err)) => Err(stop_err),
            (Ok(()), Ok(())) => {
                info!(
                    "Line follow done: {} ticks, {} transitions",
                    report.ticks, report.transitions
                );
                Ok(report)
            }
        }
    }

    async fn follow<H: Hub>(
        &self,
        drive: &mut MotionPrimitives<H>,
        gate: &SensorGate,
        report: &mut FollowReport,
    ) -> Result<()> {
        let config = drive.config().clone();
        // The encoder budget is owned by this loop
        if let StopCondition::UntilEncoderAbs { motor, .. } = self.stop {
            drive
                .hub_mut()
                .reset_relative_position(drive_motor(&config, motor))?;
        }

        let started = Instant::now();
        let mut state: Option<FollowState> = None;
        loop {
            gate.check(started)?;

            let sample = match drive.hub_mut().color(config.color_sensor) {
                Ok(color) => color,
                Err(HubError::SensorUnavailable { .. }) => Color::None,
                Err(e) => return Err(e.into()),
            };
            let next = if sample == self.line_color {
                FollowState::OnTargetColor
            } else {
                FollowState::OffTargetColor
            };
            if let Some(previous) = state.filter(|s| *s != next) {
                debug!("Follower {:?} -> {:?} on {:?}", previous, next, sample);
                report.transitions += 1;
                if previous == FollowState::OnTargetColor {
                    report.cycles += 1;
                }
            }
            state = Some(next);

            let power = self.power(next);
            drive.tank(power.left, power.right).await?;
            report.ticks += 1;

            let done = match self.stop {
                StopCondition::UntilColorReached(color) => sample == color,
                StopCondition::UntilEncoderAbs { motor, degrees } => {
                    let position = drive
                        .hub_mut()
                        .relative_position(drive_motor(&config, motor))?;
                    position.abs() >= degrees
                }
                StopCondition::Cycles(count) => report.cycles >= count,
                StopCondition::Unbounded => false,
            };
            if done {
                return Ok(());
            }
            gate.tick().await;
        }
    }
}
