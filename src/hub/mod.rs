// Hardware collaborator for the SPIKE hub
//
// Provides:
// - Port, color and stop-mode vocabulary shared with the hub bridge
// - The `Hub` trait every motion and sensing primitive is written against
// - A Zenoh bridge implementation and a simulated hub for tests and dry runs

pub mod sim;
pub mod zenoh_bridge;

use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::messages::MissionStatus;

pub use sim::{EncoderModel, SensorTrace, SimHub};
pub use zenoh_bridge::ZenohHub;

pub type Result<T> = std::result::Result<T, HubError>;

/// Hub ports A-F
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Port {
    pub const ALL: [Port; 6] = [Port::A, Port::B, Port::C, Port::D, Port::E, Port::F];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Color sensor palette. A reading is one instantaneous sample, never debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    Magenta,
    Violet,
    Blue,
    Azure,
    Turquoise,
    Green,
    Yellow,
    Orange,
    Red,
    White,
    /// Nothing recognizable under the sensor
    None,
}

/// How a single motor comes to rest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Coast,
    #[default]
    Brake,
    Hold,
}

/// Narrow interface to the motors and sensors.
///
/// Commands are async because the blocking variants (`move_for_degrees`,
/// `run_motor_for_degrees`) only resolve once the hub reports the motion
/// complete. Reads are synchronous single samples.
#[allow(async_fn_in_trait)]
pub trait Hub {
    /// Bind the two drive motors into the single motor pair
    async fn pair(&mut self, left: Port, right: Port) -> Result<()>;

    /// Synchronized pair travel; resolves when the encoder travel completes
    async fn move_for_degrees(&mut self, degrees: i32, steering: i32, velocity: i32)
    -> Result<()>;

    /// Independent wheel velocities, returns immediately
    async fn move_tank(&mut self, left: i32, right: i32) -> Result<()>;

    /// Continuous pair drive, returns immediately
    async fn move_pair(&mut self, steering: i32, velocity: i32) -> Result<()>;

    async fn stop_pair(&mut self) -> Result<()>;

    async fn run_motor(&mut self, port: Port, velocity: i32) -> Result<()>;

    async fn stop_motor(&mut self, port: Port, mode: StopMode) -> Result<()>;

    async fn run_motor_for_degrees(&mut self, port: Port, degrees: i32, velocity: i32)
    -> Result<()>;

    fn reset_relative_position(&mut self, port: Port) -> Result<()>;

    fn relative_position(&mut self, port: Port) -> Result<i32>;

    fn color(&mut self, port: Port) -> Result<Color>;

    /// Distance in millimeters; `None` when no target is in range
    fn distance(&mut self, port: Port) -> Result<Option<u16>>;

    async fn report_status(&mut self, _status: &MissionStatus) -> Result<()> {
        Ok(())
    }
}
