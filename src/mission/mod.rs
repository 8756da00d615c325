// Declarative missions
//
// A mission is plain data: an ordered list of steps. The sequencer executes
// it against any `Hub`, so the same script runs on the robot or replays
// against the simulator with scripted sensor samples.

pub mod scripts;
mod sequencer;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{CLAW_DEGREES, CLAW_VELOCITY, MAX_VELOCITY};
use crate::error::{HubError, MissionError, Result};
use crate::hub::{Color, Hub, Port};
use crate::line_follower::{LineFollower, StopCondition};
use crate::motion::{MotionCommand, Side, TankPower, rotations_to_degrees};
use crate::sensing::WaitCondition;

pub use sequencer::{MissionReport, MissionSequencer};

/// Claw (attachment motor) travel; degrees are magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClawAction {
    Raise {
        #[serde(default = "claw_degrees")]
        degrees: i32,
        #[serde(default = "claw_velocity")]
        velocity: i32,
    },
    Lower {
        #[serde(default = "claw_degrees")]
        degrees: i32,
        #[serde(default = "claw_velocity")]
        velocity: i32,
    },
}

fn claw_degrees() -> i32 {
    CLAW_DEGREES
}

fn claw_velocity() -> i32 {
    CLAW_VELOCITY
}

/// Test applied to a single sensor snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPredicate {
    ColorIs(Color),
    ColorIsNot(Color),
    DistanceBelow(u16),
}

impl SnapshotPredicate {
    /// Sample the sensor once. An unavailable sensor or absent distance is false.
    pub fn evaluate<H: Hub>(&self, hub: &mut H, color_port: Port, distance_port: Port) -> std::result::Result<bool, HubError> {
        let result = match *self {
            SnapshotPredicate::ColorIs(color) => hub.color(color_port).map(|c| c == color),
            SnapshotPredicate::ColorIsNot(color) => hub.color(color_port).map(|c| c != color),
            SnapshotPredicate::DistanceBelow(mm) => hub
                .distance(distance_port)
                .map(|reading| reading.is_some_and(|d| d < mm)),
        };
        match result {
            Err(HubError::SensorUnavailable { .. }) => Ok(false),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStep {
    Move(MotionCommand),
    Wait(WaitCondition),
    FollowLine(LineFollower),
    /// One snapshot selects a continuation; both rejoin the following step
    Branch {
        when: SnapshotPredicate,
        #[serde(default)]
        then: Vec<MissionStep>,
        #[serde(default, rename = "else")]
        otherwise: Vec<MissionStep>,
    },
    Pause(u64),
    Claw(ClawAction),
}

/// Ordered, immutable list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionScript {
    pub name: String,
    pub steps: Vec<MissionStep>,
}

impl MissionScript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| MissionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Total steps including those nested in branches
    pub fn len(&self) -> usize {
        fn count(steps: &[MissionStep]) -> usize {
            steps
                .iter()
                .map(|step| match step {
                    MissionStep::Branch { then, otherwise, .. } => 1 + count(then) + count(otherwise),
                    _ => 1,
                })
                .sum()
        }
        count(&self.steps)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reject scripts that could never run correctly, before anything moves
    pub fn validate(&self) -> Result<()> {
        validate_steps(&self.steps)
    }
}

fn check_velocity(velocity: i32) -> Result<()> {
    if velocity.abs() > MAX_VELOCITY {
        return Err(MissionError::Configuration(format!(
            "velocity {} exceeds {}",
            velocity, MAX_VELOCITY
        )));
    }
    Ok(())
}

fn validate_steps(steps: &[MissionStep]) -> Result<()> {
    for step in steps {
        match step {
            MissionStep::Move(command) => match *command {
                MotionCommand::Straight { velocity, .. }
                | MotionCommand::TurnPhased { velocity, .. }
                | MotionCommand::Drive { velocity } => check_velocity(velocity)?,
                MotionCommand::TurnDesync { velocity, .. } => {
                    if let Some(velocity) = velocity {
                        check_velocity(velocity)?
                    }
                }
                MotionCommand::StraightCm { cm, velocity } => {
                    if !cm.is_finite() {
                        return Err(MissionError::Configuration(format!(
                            "distance {} cm is not finite",
                            cm
                        )));
                    }
                    check_velocity(velocity)?
                }
                MotionCommand::TankDrive { left, right } => {
                    check_velocity(left)?;
                    check_velocity(right)?
                }
                MotionCommand::Stop => {}
            },
            MissionStep::FollowLine(follower) => {
                follower.validate()?;
                for power in [follower.on_power, follower.off_power] {
                    check_velocity(power.left)?;
                    check_velocity(power.right)?;
                }
            }
            MissionStep::Wait(WaitCondition::UntilEncoderAbs { degrees, .. }) if *degrees <= 0 => {
                return Err(MissionError::Configuration(format!(
                    "encoder wait must be positive, got {}",
                    degrees
                )));
            }
            MissionStep::Branch { then, otherwise, .. } => {
                validate_steps(then)?;
                validate_steps(otherwise)?;
            }
            MissionStep::Claw(ClawAction::Raise { velocity, .. })
            | MissionStep::Claw(ClawAction::Lower { velocity, .. }) => check_velocity(*velocity)?,
            MissionStep::Wait(_) | MissionStep::Pause(_) => {}
        }
    }
    Ok(())
}

// Pivot used by every phased turn in the challenge scripts
pub const TURN_PIVOT: i32 = 90;

/// Fluent construction of mission scripts
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    steps: Vec<MissionStep>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: MissionStep) -> Self {
        self.steps.push(step);
        self
    }

    fn motion(self, command: MotionCommand) -> Self {
        self.step(MissionStep::Move(command))
    }

    pub fn forward_cm(self, cm: f64, velocity: i32) -> Self {
        self.motion(MotionCommand::StraightCm { cm, velocity })
    }

    pub fn backward_cm(self, cm: f64, velocity: i32) -> Self {
        self.motion(MotionCommand::StraightCm { cm: -cm, velocity })
    }

    pub fn forward_degrees(self, degrees: i32, velocity: i32) -> Self {
        self.motion(MotionCommand::Straight { degrees, velocity })
    }

    pub fn backward_degrees(self, degrees: i32, velocity: i32) -> Self {
        self.motion(MotionCommand::Straight {
            degrees: -degrees,
            velocity,
        })
    }

    pub fn forward_rotations(self, rotations: i32, velocity: i32) -> Self {
        self.forward_degrees(rotations_to_degrees(rotations), velocity)
    }

    pub fn backward_rotations(self, rotations: i32, velocity: i32) -> Self {
        self.backward_degrees(rotations_to_degrees(rotations), velocity)
    }

    pub fn turn_right(self, degrees: i32, velocity: i32) -> Self {
        self.motion(MotionCommand::TurnPhased {
            degrees,
            pivot: TURN_PIVOT,
            velocity,
        })
    }

    pub fn turn_left(self, degrees: i32, velocity: i32) -> Self {
        self.motion(MotionCommand::TurnPhased {
            degrees: -degrees,
            pivot: TURN_PIVOT,
            velocity,
        })
    }

    /// Calibrated single-wheel turn
    pub fn turn_desync(self, side: Side) -> Self {
        self.motion(MotionCommand::TurnDesync {
            side,
            duration_ms: None,
            velocity: None,
        })
    }

    pub fn tank(self, left: i32, right: i32) -> Self {
        self.motion(MotionCommand::TankDrive { left, right })
    }

    pub fn drive(self, velocity: i32) -> Self {
        self.motion(MotionCommand::Drive { velocity })
    }

    pub fn stop(self) -> Self {
        self.motion(MotionCommand::Stop)
    }

    pub fn wait(self, condition: WaitCondition) -> Self {
        self.step(MissionStep::Wait(condition))
    }

    pub fn wait_color(self, color: Color) -> Self {
        self.wait(WaitCondition::UntilColor(color))
    }

    pub fn pause_ms(self, ms: u64) -> Self {
        self.step(MissionStep::Pause(ms))
    }

    pub fn follow_line(self, line_color: Color, on_power: TankPower, off_power: TankPower, stop: StopCondition) -> Self {
        self.step(MissionStep::FollowLine(LineFollower::new(
            line_color, on_power, off_power, stop,
        )))
    }

    /// Start driving, wait for the condition, stop
    pub fn drive_until(self, velocity: i32, condition: WaitCondition) -> Self {
        self.drive(velocity).wait(condition).stop()
    }

    pub fn branch(self, when: SnapshotPredicate, then: ScriptBuilder, otherwise: ScriptBuilder) -> Self {
        self.step(MissionStep::Branch {
            when,
            then: then.steps,
            otherwise: otherwise.steps,
        })
    }

    pub fn raise_claw(self, degrees: i32, velocity: i32) -> Self {
        self.step(MissionStep::Claw(ClawAction::Raise { degrees, velocity }))
    }

    pub fn lower_claw(self, degrees: i32, velocity: i32) -> Self {
        self.step(MissionStep::Claw(ClawAction::Lower { degrees, velocity }))
    }

    pub fn build(self, name: impl Into<String>) -> MissionScript {
        MissionScript {
            name: name.into(),
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_script() {
        let script = MissionScript::from_json(
            r#"{
                "name": "approach",
                "steps": [
                    { "move": { "kind": "straight_cm", "cm": 55.0, "velocity": 1000 } },
                    { "move": { "kind": "turn_phased", "degrees": -90, "pivot": 90, "velocity": 300 } },
                    { "move": { "kind": "drive", "velocity": 300 } },
                    { "wait": { "until_distance_below": 350 } },
                    { "move": { "kind": "stop" } },
                    { "branch": {
                        "when": { "color_is": "yellow" },
                        "then": [ { "pause": 500 } ],
                        "else": [ { "claw": { "raise": {} } } ]
                    } },
                    { "follow_line": {
                        "line_color": "black",
                        "on_power": { "left": 900, "right": 800 },
                        "off_power": { "left": 800, "right": 900 },
                        "stop": { "until_encoder_abs": { "motor": "right", "degrees": 1200 } }
                    } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.steps.len(), 7);
        assert_eq!(script.len(), 9);
        assert_eq!(script.steps[3], MissionStep::Wait(WaitCondition::UntilDistanceBelow(350)));
        match &script.steps[5] {
            MissionStep::Branch { when, then, otherwise } => {
                assert_eq!(*when, SnapshotPredicate::ColorIs(Color::Yellow));
                assert_eq!(then, &vec![MissionStep::Pause(500)]);
                assert_eq!(
                    otherwise,
                    &vec![MissionStep::Claw(ClawAction::Raise {
                        degrees: 90,
                        velocity: 365
                    })]
                );
            }
            other => panic!("expected branch, got {:?}", other),
        }
        assert!(script.validate().is_ok());
    }

    #[test]
    fn test_predicate_on_unavailable_sensor_is_false() {
        let config = crate::config::RobotConfig::default();
        let (color, distance) = (config.color_sensor, config.distance_sensor);
        let mut hub = crate::hub::SimHub::new()
            .with_unavailable(color)
            .with_unavailable(distance);
        for predicate in [
            SnapshotPredicate::ColorIs(Color::Red),
            SnapshotPredicate::ColorIsNot(Color::Red),
            SnapshotPredicate::DistanceBelow(500),
        ] {
            assert!(!predicate.evaluate(&mut hub, color, distance).unwrap(), "{:?}", predicate);
        }
    }

    #[test]
    fn test_validation_reaches_into_branches() {
        let script = ScriptBuilder::new()
            .forward_cm(10.0, 500)
            .branch(
                SnapshotPredicate::ColorIs(Color::Red),
                ScriptBuilder::new().backward_cm(135.0, 5000),
                ScriptBuilder::new(),
            )
            .build("too fast");
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("5000"), "{}", err);
    }

    #[test]
    fn test_builder_turn_and_distance_conventions() {
        let script = ScriptBuilder::new()
            .turn_right(90, 300)
            .turn_left(88, 300)
            .backward_cm(20.0, 600)
            .forward_rotations(2, 500)
            .build("conventions");
        assert_eq!(
            script.steps,
            vec![
                MissionStep::Move(MotionCommand::TurnPhased { degrees: 90, pivot: 90, velocity: 300 }),
                MissionStep::Move(MotionCommand::TurnPhased { degrees: -88, pivot: 90, velocity: 300 }),
                MissionStep::Move(MotionCommand::StraightCm { cm: -20.0, velocity: 600 }),
                MissionStep::Move(MotionCommand::Straight { degrees: 720, velocity: 500 }),
            ]
        );
    }
}
