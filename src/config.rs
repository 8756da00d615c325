// Physical constants, port bindings, topics and the validated robot configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MissionError;
use crate::hub::Port;

// Wheel circumference of the drive wheels (cm)
pub const WHEEL_CIRCUMFERENCE_CM: f64 = 17.58;

// Motor shaft degrees in one full wheel rotation
pub const DEGREES_PER_ROTATION: i32 = 360;

// Poll granularity of every sensor-gated loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

// How long a blocking motion may take before the bridge is considered stuck
pub const MOTION_TIMEOUT: Duration = Duration::from_secs(30);

// Hub velocity limit (deg/s)
pub const MAX_VELOCITY: i32 = 1110;

// Claw travel and speed when a script leaves them out
pub const CLAW_DEGREES: i32 = 90;
pub const CLAW_VELOCITY: i32 = 365;

// Zenoh topics
pub const TOPIC_HUB_CMD: &str = "spike/cmd/hub"; // commands to the hub bridge
pub const TOPIC_HUB_STATE: &str = "spike/state/hub"; // sensor and encoder snapshots
pub const TOPIC_MISSION_STATUS: &str = "spike/state/mission"; // mission status

/// Immutable robot configuration, validated once before any motion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub wheel_circumference_cm: f64,
    pub left_motor: Port,
    pub right_motor: Port,
    pub claw_motor: Port,
    pub color_sensor: Port,
    pub distance_sensor: Port,
    pub poll_interval_ms: u64,
    /// Upper bound on a single sensor wait; `None` waits forever
    pub wait_timeout_ms: Option<u64>,
    pub motion_timeout_ms: u64,
    /// Calibrated duration of a single-wheel turn
    pub desync_turn_ms: u64,
    pub desync_velocity: i32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_circumference_cm: WHEEL_CIRCUMFERENCE_CM,
            left_motor: Port::F,
            right_motor: Port::B,
            claw_motor: Port::E,
            color_sensor: Port::C,
            distance_sensor: Port::A,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            wait_timeout_ms: None,
            motion_timeout_ms: MOTION_TIMEOUT.as_millis() as u64,
            desync_turn_ms: 800,
            desync_velocity: 500,
        }
    }
}

impl RobotConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, MissionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MissionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MissionError> {
        if !self.wheel_circumference_cm.is_finite() || self.wheel_circumference_cm <= 0.0 {
            return Err(MissionError::Configuration(format!(
                "wheel circumference must be positive, got {}",
                self.wheel_circumference_cm
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(MissionError::Configuration(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        if self.motion_timeout_ms == 0 {
            return Err(MissionError::Configuration(
                "motion timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.desync_velocity.abs() > MAX_VELOCITY {
            return Err(MissionError::Configuration(format!(
                "desync velocity {} exceeds {}",
                self.desync_velocity, MAX_VELOCITY
            )));
        }

        let ports = [
            ("left motor", self.left_motor),
            ("right motor", self.right_motor),
            ("claw motor", self.claw_motor),
            ("color sensor", self.color_sensor),
            ("distance sensor", self.distance_sensor),
        ];
        for (i, (name, port)) in ports.iter().enumerate() {
            if let Some((other, _)) = ports[i + 1..].iter().find(|(_, p)| p == port) {
                return Err(MissionError::Configuration(format!(
                    "{} and {} are both bound to port {:?}",
                    name, other, port
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }

    pub fn desync_turn(&self) -> Duration {
        Duration::from_millis(self.desync_turn_ms)
    }
}
