// Error taxonomy for the hub collaborator and the mission layer

use std::time::Duration;

use crate::hub::Port;

/// Failures reported by the hardware collaborator
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Sensor on port {port:?} unavailable")]
    SensorUnavailable { port: Port },

    #[error("Motion {id} not completed within {timeout:?}")]
    MotionTimeout { id: u64, timeout: Duration },

    #[error("Hub bridge did not accept session {session} within {timeout:?}")]
    SessionTimeout { session: u64, timeout: Duration },

    #[error("Motor pair used before pairing")]
    NotPaired,
}

/// Failures that abort a mission
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sensor wait exceeded {waited:?}")]
    SensorTimeout { waited: Duration },

    #[error("Mission cancelled")]
    Cancelled,

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MissionError>;
