// Motion layer for the two-motor drive base
//
// Provides:
// - Centimeter / rotation to motor-degree conversion
// - Motion commands (straight, phased turn, single-wheel turn, tank, drive, stop)
// - `MotionPrimitives`, which owns the hub and issues those commands

mod primitives;
pub mod units;

use serde::{Deserialize, Serialize};

pub use primitives::MotionPrimitives;
pub use units::{cm_to_degrees, rotations_to_degrees};

/// Which side of the robot a turn heads toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// One drive-train command. Issuing a command supersedes whatever was running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Synchronized travel; negative degrees reverse
    Straight { degrees: i32, velocity: i32 },
    /// Same as `Straight`, converted with the wheel circumference when issued
    StraightCm { cm: f64, velocity: i32 },
    /// Phased turn; the sign of `degrees` selects right (+) or left (-)
    TurnPhased {
        degrees: i32,
        pivot: i32,
        velocity: i32,
    },
    /// Drive one wheel for a fixed time; `None` uses the calibrated duration
    /// and velocity from the robot config
    TurnDesync {
        side: Side,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        velocity: Option<i32>,
    },
    TankDrive { left: i32, right: i32 },
    /// Indefinite straight drive; negative velocity reverses
    Drive { velocity: i32 },
    Stop,
}

/// Left/right wheel velocity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankPower {
    pub left: i32,
    pub right: i32,
}

impl TankPower {
    pub const fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// The opposite-biased differential
    pub const fn mirrored(self) -> Self {
        Self {
            left: self.right,
            right: self.left,
        }
    }
}

impl From<(i32, i32)> for TankPower {
    fn from((left, right): (i32, i32)) -> Self {
        Self { left, right }
    }
}
