// Drive primitives for the paired motors
//
// Owns the hub for the run so only one command is ever in flight: each new
// command supersedes the previous one, nothing is queued.

use tracing::{debug, info};

use super::{MotionCommand, Side, cm_to_degrees};
use crate::config::{MAX_VELOCITY, RobotConfig};
use crate::error::Result;
use crate::hub::{Hub, StopMode};
use crate::sensing::SensorGate;

/// Clamp a velocity command to the hub's limit
fn clamp_velocity(velocity: i32) -> i32 {
    velocity.clamp(-MAX_VELOCITY, MAX_VELOCITY)
}

pub struct MotionPrimitives<H: Hub> {
    hub: H,
    config: RobotConfig,
    in_flight: Option<MotionCommand>,
}

impl<H: Hub> MotionPrimitives<H> {
    pub fn new(hub: H, config: RobotConfig) -> Self {
        Self {
            hub,
            config,
            in_flight: None,
        }
    }

    /// Pair the drive motors. Must be called before any pair command.
    pub async fn initialize(&mut self) -> Result<()> {
        info!(
            "Pairing drive motors left={:?} right={:?}",
            self.config.left_motor, self.config.right_motor
        );
        self.hub
            .pair(self.config.left_motor, self.config.right_motor)
            .await?;
        Ok(())
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut H {
        &mut self.hub
    }

    /// The indefinite command still running on the pair, if any
    pub fn in_flight(&self) -> Option<&MotionCommand> {
        self.in_flight.as_ref()
    }

    /// Issue any motion command, awaiting completion for the blocking ones
    pub async fn execute(&mut self, command: &MotionCommand, gate: &SensorGate) -> Result<()> {
        match *command {
            MotionCommand::Straight { degrees, velocity } => {
                self.move_straight(degrees, velocity).await
            }
            MotionCommand::StraightCm { cm, velocity } => self.move_cm(cm, velocity).await,
            MotionCommand::TurnPhased {
                degrees,
                pivot,
                velocity,
            } => self.turn_phased(degrees, pivot, velocity).await,
            MotionCommand::TurnDesync {
                side,
                duration_ms,
                velocity,
            } => {
                let duration = duration_ms
                    .map(std::time::Duration::from_millis)
                    .unwrap_or_else(|| self.config.desync_turn());
                let velocity = velocity.unwrap_or(self.config.desync_velocity);
                self.turn_desync(side, velocity, duration, gate).await
            }
            MotionCommand::TankDrive { left, right } => self.tank(left, right).await,
            MotionCommand::Drive { velocity } => self.drive(velocity).await,
            MotionCommand::Stop => self.stop().await,
        }
    }

    /// Both wheels travel the same signed degree count; returns when done
    pub async fn move_straight(&mut self, degrees: i32, velocity: i32) -> Result<()> {
        debug!("Straight {} deg at {}", degrees, velocity);
        self.in_flight = None;
        self.hub
            .move_for_degrees(degrees, 0, clamp_velocity(velocity))
            .await?;
        Ok(())
    }

    pub async fn move_cm(&mut self, cm: f64, velocity: i32) -> Result<()> {
        let degrees = cm_to_degrees(cm, self.config.wheel_circumference_cm);
        debug!("{} cm -> {} deg", cm, degrees);
        self.move_straight(degrees, velocity).await
    }

    /// Phased turn; `pivot` biases the radius (0 = in place), sign of `degrees` picks the side
    pub async fn turn_phased(&mut self, degrees: i32, pivot: i32, velocity: i32) -> Result<()> {
        debug!("Phased turn {} deg, pivot {} at {}", degrees, pivot, velocity);
        self.in_flight = None;
        self.hub
            .move_for_degrees(degrees, pivot, clamp_velocity(velocity))
            .await?;
        Ok(())
    }

    /// Run a single wheel for a fixed time, then brake it.
    ///
    /// Open loop: the duration is a calibrated constant, so the resulting
    /// angle drifts with battery level and floor friction. A right turn drives
    /// the left wheel and vice versa. The left motor is mounted mirrored, so
    /// it is driven with the negated velocity.
    pub async fn turn_desync(
        &mut self,
        side: Side,
        velocity: i32,
        duration: std::time::Duration,
        gate: &SensorGate,
    ) -> Result<()> {
        let (port, signed) = match side {
            Side::Right => (self.config.left_motor, -velocity.abs()),
            Side::Left => (self.config.right_motor, velocity.abs()),
        };
        debug!("Desync turn {:?}: port {:?} at {} for {:?}", side, port, signed, duration);
        self.in_flight = None;
        self.hub.run_motor(port, clamp_velocity(signed)).await?;
        let paused = gate.pause(duration).await;
        // Brake even when the pause was cancelled
        self.hub.stop_motor(port, StopMode::Brake).await?;
        paused
    }

    /// Independent wheel velocities; keeps running until superseded
    pub async fn tank(&mut self, left: i32, right: i32) -> Result<()> {
        let (left, right) = (clamp_velocity(left), clamp_velocity(right));
        self.hub.move_tank(left, right).await?;
        self.in_flight = Some(MotionCommand::TankDrive { left, right });
        Ok(())
    }

    /// Continuous straight drive; negative velocity reverses
    pub async fn drive(&mut self, velocity: i32) -> Result<()> {
        let velocity = clamp_velocity(velocity);
        self.hub.move_pair(0, velocity).await?;
        self.in_flight = Some(MotionCommand::Drive { velocity });
        Ok(())
    }

    pub async fn reverse(&mut self, velocity: i32) -> Result<()> {
        self.drive(-velocity.abs()).await
    }

    /// Zero velocity on both wheels. Idempotent.
    pub async fn stop(&mut self) -> Result<()> {
        self.hub.stop_pair().await?;
        self.in_flight = None;
        Ok(())
    }

    pub async fn raise_claw(&mut self, degrees: i32, velocity: i32) -> Result<()> {
        self.run_claw(degrees.abs(), velocity).await
    }

    pub async fn lower_claw(&mut self, degrees: i32, velocity: i32) -> Result<()> {
        self.run_claw(-degrees.abs(), velocity).await
    }

    async fn run_claw(&mut self, degrees: i32, velocity: i32) -> Result<()> {
        debug!("Claw {} deg at {}", degrees, velocity);
        self.hub
            .run_motor_for_degrees(self.config.claw_motor, degrees, clamp_velocity(velocity))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hub::{Port, SimHub};
    use crate::messages::HubCommand;
    use crate::sensing::CancelToken;

    async fn primitives() -> MotionPrimitives<SimHub> {
        let mut drive = MotionPrimitives::new(SimHub::new(), RobotConfig::default());
        drive.initialize().await.unwrap();
        drive
    }

    fn gate() -> SensorGate {
        SensorGate::new(Duration::from_millis(10), None, CancelToken::new())
    }

    #[tokio::test]
    async fn test_reverse_straight_is_exact_negation() {
        for degrees in [0, 1, 90, 3993, 12345] {
            let mut drive = primitives().await;
            drive.move_straight(degrees, 600).await.unwrap();
            drive.move_straight(-degrees, 600).await.unwrap();

            let travel: Vec<i32> = drive
                .hub()
                .log()
                .iter()
                .filter_map(|cmd| match *cmd {
                    HubCommand::MoveForDegrees { degrees, .. } => Some(degrees),
                    _ => None,
                })
                .collect();
            assert_eq!(travel, vec![degrees, -degrees]);
        }
    }

    #[tokio::test]
    async fn test_move_cm_converts_with_circumference() {
        let mut drive = primitives().await;
        drive.move_cm(195.0, 600).await.unwrap();
        assert_eq!(
            drive.hub().log().last(),
            Some(&HubCommand::MoveForDegrees {
                id: 1,
                degrees: 3993,
                steering: 0,
                velocity: 600
            })
        );
    }

    #[tokio::test]
    async fn test_velocity_clamped() {
        let mut drive = primitives().await;
        drive.tank(5000, -5000).await.unwrap();
        assert_eq!(drive.hub().tank_commands(), vec![(1110, -1110)]);
    }

    #[tokio::test]
    async fn test_new_command_supersedes_in_flight() {
        let mut drive = primitives().await;
        drive.drive(500).await.unwrap();
        assert_eq!(drive.in_flight(), Some(&MotionCommand::Drive { velocity: 500 }));

        drive.tank(400, 300).await.unwrap();
        assert_eq!(
            drive.in_flight(),
            Some(&MotionCommand::TankDrive {
                left: 400,
                right: 300
            })
        );

        drive.turn_phased(90, 90, 300).await.unwrap();
        assert_eq!(drive.in_flight(), None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut drive = primitives().await;
        drive.reverse(500).await.unwrap();
        drive.stop().await.unwrap();
        drive.stop().await.unwrap();
        assert_eq!(drive.in_flight(), None);
        assert_eq!(drive.hub().count(|c| *c == HubCommand::StopPair), 2);
        assert!(drive.hub().log().contains(&HubCommand::Move {
            steering: 0,
            velocity: -500
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_desync_turn_runs_one_wheel_then_brakes() {
        let mut drive = primitives().await;
        let started = tokio::time::Instant::now();
        drive
            .turn_desync(Side::Right, 500, Duration::from_millis(800), &gate())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(800));

        let log = drive.hub().log();
        assert_eq!(
            &log[1..],
            &[
                HubCommand::RunMotor {
                    port: Port::F,
                    velocity: -500
                },
                HubCommand::StopMotor {
                    port: Port::F,
                    mode: StopMode::Brake
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_desync_turn_uses_calibrated_defaults() {
        let config = RobotConfig {
            desync_turn_ms: 300,
            desync_velocity: 650,
            ..Default::default()
        };
        let mut drive = MotionPrimitives::new(SimHub::new(), config);
        drive.initialize().await.unwrap();

        let started = tokio::time::Instant::now();
        let calibrated = MotionCommand::TurnDesync {
            side: Side::Right,
            duration_ms: None,
            velocity: None,
        };
        drive.execute(&calibrated, &gate()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(300));

        let explicit = MotionCommand::TurnDesync {
            side: Side::Left,
            duration_ms: Some(100),
            velocity: Some(400),
        };
        drive.execute(&explicit, &gate()).await.unwrap();

        let runs: Vec<(Port, i32)> = drive
            .hub()
            .log()
            .iter()
            .filter_map(|cmd| match *cmd {
                HubCommand::RunMotor { port, velocity } => Some((port, velocity)),
                _ => None,
            })
            .collect();
        assert_eq!(runs, vec![(Port::F, -650), (Port::B, 400)]);
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_desync_turn_brakes_when_cancelled() {
        let mut drive = primitives().await;
        let gate = gate();
        gate.cancel_token().cancel();
        let result = drive
            .execute(
                &MotionCommand::TurnDesync {
                    side: Side::Left,
                    duration_ms: None,
                    velocity: None,
                },
                &gate,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(
            drive.hub().log().last(),
            Some(&HubCommand::StopMotor {
                port: Port::B,
                mode: StopMode::Brake
            })
        );
    }

    #[tokio::test]
    async fn test_claw_direction() {
        let mut drive = primitives().await;
        drive.raise_claw(90, 365).await.unwrap();
        drive.lower_claw(90, 365).await.unwrap();
        let degrees: Vec<i32> = drive
            .hub()
            .log()
            .iter()
            .filter_map(|cmd| match *cmd {
                HubCommand::RunMotorForDegrees { port: Port::E, degrees, .. } => Some(degrees),
                _ => None,
            })
            .collect();
        assert_eq!(degrees, vec![90, -90]);
    }
}
