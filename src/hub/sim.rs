// Simulated hub
//
// Replays scripted color and distance samples, models encoder travel from the
// commanded wheel velocities, and records every command as the `HubCommand`
// the bridge would have received. Time is taken from `tokio::time`, so tests
// running on a paused clock see exact, repeatable encoder values.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::{Color, Hub, Port, Result, StopMode};
use crate::error::{HubError, MissionError};
use crate::messages::{HubCommand, MissionStatus};

/// How encoder travel accumulates while motors run indefinitely
#[derive(Debug, Clone, Copy)]
pub enum EncoderModel {
    /// Velocity is deg/s, travel is velocity * elapsed time
    Velocity,
    /// At every `period` boundary each running motor advances `degrees` in
    /// its current direction of travel
    Ticks { period: Duration, degrees: i32 },
}

/// Sensor samples for a simulated run, loadable from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorTrace {
    pub colors: Vec<Color>,
    pub distances: Vec<Option<u16>>,
    /// Reading once `colors` is exhausted
    pub fallback_color: Option<Color>,
}

impl SensorTrace {
    pub fn load(path: &Path) -> std::result::Result<Self, MissionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MissionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub struct SimHub {
    colors: VecDeque<Color>,
    distances: VecDeque<Option<u16>>,
    fallback_color: Color,
    encoder: EncoderModel,
    pair: Option<(Port, Port)>,
    velocities: [i32; 6],
    travel: [f64; 6],
    offsets: [f64; 6],
    since: Instant,
    log: Vec<HubCommand>,
    statuses: Vec<MissionStatus>,
    next_id: u64,
    unavailable: Vec<Port>,
    color_reads: usize,
    distance_reads: usize,
}

impl Default for SimHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHub {
    pub fn new() -> Self {
        Self {
            colors: VecDeque::new(),
            distances: VecDeque::new(),
            fallback_color: Color::White,
            encoder: EncoderModel::Velocity,
            pair: None,
            velocities: [0; 6],
            travel: [0.0; 6],
            offsets: [0.0; 6],
            since: Instant::now(),
            log: Vec::new(),
            statuses: Vec::new(),
            next_id: 1,
            unavailable: Vec::new(),
            color_reads: 0,
            distance_reads: 0,
        }
    }

    pub fn from_trace(trace: SensorTrace) -> Self {
        let mut hub = Self::new()
            .with_colors(trace.colors)
            .with_distances(trace.distances);
        if let Some(color) = trace.fallback_color {
            hub.fallback_color = color;
        }
        hub
    }

    pub fn with_colors(mut self, colors: impl IntoIterator<Item = Color>) -> Self {
        self.colors = colors.into_iter().collect();
        self
    }

    pub fn with_distances(mut self, distances: impl IntoIterator<Item = Option<u16>>) -> Self {
        self.distances = distances.into_iter().collect();
        self
    }

    pub fn with_fallback_color(mut self, color: Color) -> Self {
        self.fallback_color = color;
        self
    }

    pub fn with_encoder(mut self, model: EncoderModel) -> Self {
        self.encoder = model;
        self
    }

    /// Reads from a sensor on `port` fail with `SensorUnavailable`
    pub fn with_unavailable(mut self, port: Port) -> Self {
        self.unavailable.push(port);
        self
    }

    fn sensor(&self, port: Port) -> Result<()> {
        if self.unavailable.contains(&port) {
            return Err(HubError::SensorUnavailable { port });
        }
        Ok(())
    }

    /// Every command received so far, oldest first
    pub fn log(&self) -> &[HubCommand] {
        &self.log
    }

    pub fn statuses(&self) -> &[MissionStatus] {
        &self.statuses
    }

    pub fn color_reads(&self) -> usize {
        self.color_reads
    }

    pub fn distance_reads(&self) -> usize {
        self.distance_reads
    }

    /// Tank commands in the order issued
    pub fn tank_commands(&self) -> Vec<(i32, i32)> {
        self.log
            .iter()
            .filter_map(|cmd| match *cmd {
                HubCommand::MoveTank { left, right } => Some((left, right)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&HubCommand) -> bool) -> usize {
        self.log.iter().filter(|cmd| pred(cmd)).count()
    }

    fn travel_since(&self, velocity: i32, elapsed: Duration) -> f64 {
        if velocity == 0 {
            return 0.0;
        }
        match self.encoder {
            EncoderModel::Velocity => velocity as f64 * elapsed.as_secs_f64(),
            EncoderModel::Ticks { period, degrees } => {
                let ticks = elapsed.as_nanos() / period.as_nanos().max(1);
                (ticks as f64) * (degrees as f64) * (velocity.signum() as f64)
            }
        }
    }

    /// Time the encoder model can account for; a partial tick period stays
    /// pending until it completes
    fn creditable(&self, elapsed: Duration) -> Duration {
        match self.encoder {
            EncoderModel::Velocity => elapsed,
            EncoderModel::Ticks { period, .. } => {
                let period_ns = period.as_nanos().max(1);
                let ticks = elapsed.as_nanos() / period_ns;
                Duration::from_nanos((ticks * period_ns) as u64)
            }
        }
    }

    /// Fold travel up to now into the accumulators before velocities change
    fn settle(&mut self) {
        let elapsed = Instant::now().duration_since(self.since);
        let credited = self.creditable(elapsed);
        for port in Port::ALL {
            let i = port.index();
            self.travel[i] += self.travel_since(self.velocities[i], credited);
        }
        self.since += credited;
    }

    fn set_velocity(&mut self, port: Port, velocity: i32) {
        self.velocities[port.index()] = velocity;
    }

    fn paired(&self) -> Result<(Port, Port)> {
        self.pair.ok_or(HubError::NotPaired)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Hub for SimHub {
    async fn pair(&mut self, left: Port, right: Port) -> Result<()> {
        self.pair = Some((left, right));
        self.log.push(HubCommand::Pair {
            left,
            right,
            session: 0,
        });
        Ok(())
    }

    async fn move_for_degrees(&mut self, degrees: i32, steering: i32, velocity: i32) -> Result<()> {
        let (left, right) = self.paired()?;
        let id = self.allocate_id();
        self.settle();
        self.set_velocity(left, 0);
        self.set_velocity(right, 0);
        // Completes at once; full travel is credited to both wheels
        self.travel[left.index()] += degrees as f64;
        self.travel[right.index()] += degrees as f64;
        self.log.push(HubCommand::MoveForDegrees {
            id,
            degrees,
            steering,
            velocity,
        });
        Ok(())
    }

    async fn move_tank(&mut self, left_velocity: i32, right_velocity: i32) -> Result<()> {
        let (left, right) = self.paired()?;
        self.settle();
        self.set_velocity(left, left_velocity);
        self.set_velocity(right, right_velocity);
        self.log.push(HubCommand::MoveTank {
            left: left_velocity,
            right: right_velocity,
        });
        Ok(())
    }

    async fn move_pair(&mut self, steering: i32, velocity: i32) -> Result<()> {
        let (left, right) = self.paired()?;
        self.settle();
        self.set_velocity(left, velocity);
        self.set_velocity(right, velocity);
        self.log.push(HubCommand::Move { steering, velocity });
        Ok(())
    }

    async fn stop_pair(&mut self) -> Result<()> {
        let (left, right) = self.paired()?;
        self.settle();
        self.set_velocity(left, 0);
        self.set_velocity(right, 0);
        self.log.push(HubCommand::StopPair);
        Ok(())
    }

    async fn run_motor(&mut self, port: Port, velocity: i32) -> Result<()> {
        self.settle();
        self.set_velocity(port, velocity);
        self.log.push(HubCommand::RunMotor { port, velocity });
        Ok(())
    }

    async fn stop_motor(&mut self, port: Port, mode: StopMode) -> Result<()> {
        self.settle();
        self.set_velocity(port, 0);
        self.log.push(HubCommand::StopMotor { port, mode });
        Ok(())
    }

    async fn run_motor_for_degrees(&mut self, port: Port, degrees: i32, velocity: i32) -> Result<()> {
        let id = self.allocate_id();
        self.settle();
        self.set_velocity(port, 0);
        self.travel[port.index()] += degrees as f64;
        self.log.push(HubCommand::RunMotorForDegrees {
            id,
            port,
            degrees,
            velocity,
        });
        Ok(())
    }

    fn reset_relative_position(&mut self, port: Port) -> Result<()> {
        self.settle();
        self.offsets[port.index()] = self.travel[port.index()];
        Ok(())
    }

    fn relative_position(&mut self, port: Port) -> Result<i32> {
        self.settle();
        let i = port.index();
        Ok((self.travel[i] - self.offsets[i]).round() as i32)
    }

    fn color(&mut self, port: Port) -> Result<Color> {
        self.color_reads += 1;
        self.sensor(port)?;
        let color = self.colors.pop_front().unwrap_or(self.fallback_color);
        debug!("sim color read #{}: {:?}", self.color_reads, color);
        Ok(color)
    }

    fn distance(&mut self, port: Port) -> Result<Option<u16>> {
        self.distance_reads += 1;
        self.sensor(port)?;
        Ok(self.distances.pop_front().flatten())
    }

    async fn report_status(&mut self, status: &MissionStatus) -> Result<()> {
        self.statuses.push(status.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tick_encoder_advances_with_time() {
        let mut hub = SimHub::new().with_encoder(EncoderModel::Ticks {
            period: Duration::from_millis(10),
            degrees: 1,
        });
        hub.pair(Port::F, Port::B).await.unwrap();
        hub.reset_relative_position(Port::B).unwrap();

        hub.move_tank(400, -300).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(hub.relative_position(Port::F).unwrap(), 3);
        assert_eq!(hub.relative_position(Port::B).unwrap(), -3);

        hub.stop_pair().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.relative_position(Port::B).unwrap(), -3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_encoder_keeps_partial_periods() {
        let mut hub = SimHub::new().with_encoder(EncoderModel::Ticks {
            period: Duration::from_millis(10),
            degrees: 1,
        });
        hub.pair(Port::F, Port::B).await.unwrap();
        hub.move_tank(400, 400).await.unwrap();

        // Reads twice per period must not swallow the half periods
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            hub.relative_position(Port::B).unwrap();
        }
        assert_eq!(hub.relative_position(Port::B).unwrap(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_velocity_encoder_and_reset() {
        let mut hub = SimHub::new();
        hub.pair(Port::F, Port::B).await.unwrap();
        hub.move_pair(0, 500).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hub.relative_position(Port::B).unwrap(), 100);

        hub.reset_relative_position(Port::B).unwrap();
        assert_eq!(hub.relative_position(Port::B).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scripted_samples_then_fallback() {
        let mut hub = SimHub::new()
            .with_colors([Color::Black, Color::Red])
            .with_fallback_color(Color::Green)
            .with_distances([Some(120)]);
        assert_eq!(hub.color(Port::C).unwrap(), Color::Black);
        assert_eq!(hub.color(Port::C).unwrap(), Color::Red);
        assert_eq!(hub.color(Port::C).unwrap(), Color::Green);
        assert_eq!(hub.color_reads(), 3);

        assert_eq!(hub.distance(Port::A).unwrap(), Some(120));
        assert_eq!(hub.distance(Port::A).unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_sensor_port() {
        let mut hub = SimHub::new()
            .with_colors([Color::Black])
            .with_unavailable(Port::C);
        assert!(matches!(
            hub.color(Port::C),
            Err(HubError::SensorUnavailable { port: Port::C })
        ));
        assert!(hub.distance(Port::A).is_ok());
        assert_eq!(hub.color_reads(), 1);
    }

    #[tokio::test]
    async fn test_pair_required() {
        let mut hub = SimHub::new();
        assert!(matches!(
            hub.move_tank(100, 100).await,
            Err(HubError::NotPaired)
        ));
    }
}
