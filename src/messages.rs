// Wire messages exchanged with the hub bridge

use serde::{Deserialize, Serialize};

use crate::hub::{Color, Port, StopMode};

// Command from runtime -> hub bridge
// Blocking motions carry an id so the bridge can acknowledge completion.
// `Pair` opens a session: the bridge restarts its completion counter and
// echoes the session in every following snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HubCommand {
    Pair {
        left: Port,
        right: Port,
        session: u64,
    },
    MoveForDegrees {
        id: u64,
        degrees: i32,
        steering: i32,
        velocity: i32,
    },
    MoveTank {
        left: i32,
        right: i32,
    },
    Move {
        steering: i32,
        velocity: i32,
    },
    StopPair,
    RunMotor {
        port: Port,
        velocity: i32,
    },
    StopMotor {
        port: Port,
        mode: StopMode,
    },
    RunMotorForDegrees {
        id: u64,
        port: Port,
        degrees: i32,
        velocity: i32,
    },
}

// Snapshot from hub bridge -> runtime
// Positions are absolute encoder degrees indexed by port A..F
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubState {
    /// Session of the `Pair` the bridge last accepted
    #[serde(default)]
    pub session: u64,
    pub color: Option<Color>,
    pub distance_mm: Option<u16>,
    pub positions: [i32; 6],
    /// Id of the most recently completed blocking motion in `session`
    pub completed: u64,
}

/// Mission status published by runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MissionStatus {
    Idle,
    Running { mission: String },
    Completed { mission: String, steps: usize },
    Aborted { mission: String, reason: String },
}
