// Motion-and-sensing control layer for a two-motor SPIKE robot

pub mod config;
pub mod error;
pub mod hub;
pub mod line_follower;
pub mod messages;
pub mod mission;
pub mod motion;
pub mod runtime;
pub mod sensing;
