// Sensor-gated waits
//
// Every wait is a poll loop on the single control timeline: evaluate, and if
// not yet satisfied, yield for one poll interval. Each poll checks the
// cancellation token and the optional deadline, so no wait can hang a mission
// that has been aborted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::RobotConfig;
use crate::error::{HubError, MissionError, Result};
use crate::hub::{Color, Hub};
use crate::motion::Side;

/// Shared abort flag, checked at every poll tick
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Condition a `Wait` step blocks on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    UntilColor(Color),
    UntilColorNot(Color),
    /// Strictly closer than `mm`; no reading never satisfies it
    UntilDistanceBelow(u16),
    /// |relative position| of a drive motor reaches `degrees`, counted from
    /// the start of the wait
    UntilEncoderAbs { motor: Side, degrees: i32 },
}

impl WaitCondition {
    /// Take one sample and test it.
    ///
    /// An unavailable sensor counts as "not met" so the caller keeps polling.
    pub fn is_met<H: Hub>(
        &self,
        hub: &mut H,
        config: &RobotConfig,
    ) -> std::result::Result<bool, HubError> {
        let met = match self {
            WaitCondition::UntilColor(target) => {
                hub.color(config.color_sensor).map(|c| c == *target)
            }
            WaitCondition::UntilColorNot(target) => {
                hub.color(config.color_sensor).map(|c| c != *target)
            }
            WaitCondition::UntilDistanceBelow(mm) => hub
                .distance(config.distance_sensor)
                .map(|reading| reading.is_some_and(|d| d < *mm)),
            WaitCondition::UntilEncoderAbs { motor, degrees } => hub
                .relative_position(drive_motor(config, *motor))
                .map(|position| position.abs() >= *degrees),
        };
        match met {
            Err(HubError::SensorUnavailable { port }) => {
                debug!("Sensor on {:?} unavailable, condition not met", port);
                Ok(false)
            }
            other => other,
        }
    }
}

/// Port of the left or right drive motor
pub fn drive_motor(config: &RobotConfig, side: Side) -> crate::hub::Port {
    match side {
        Side::Left => config.left_motor,
        Side::Right => config.right_motor,
    }
}

/// Poll-based waiting with cancellation and an optional deadline
#[derive(Debug, Clone)]
pub struct SensorGate {
    poll_interval: Duration,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl SensorGate {
    pub fn new(poll_interval: Duration, timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            poll_interval,
            timeout,
            cancel,
        }
    }

    pub fn from_config(config: &RobotConfig, cancel: CancelToken) -> Self {
        Self::new(config.poll_interval(), config.wait_timeout(), cancel)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fail if cancelled or if the loop begun at `started` is past its deadline
    pub fn check(&self, started: Instant) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MissionError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(MissionError::SensorTimeout { waited });
            }
        }
        Ok(())
    }

    /// Yield for one poll interval
    pub async fn tick(&self) {
        sleep(self.poll_interval).await;
    }

    /// Re-evaluate `predicate` every poll interval until it holds.
    ///
    /// The first evaluation happens immediately. Returns the number of
    /// evaluations made, the last being the one that returned true.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<u32>
    where
        F: FnMut() -> std::result::Result<bool, HubError>,
    {
        let started = Instant::now();
        let mut polls = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(MissionError::Cancelled);
            }
            polls += 1;
            if predicate()? {
                debug!("Wait satisfied after {} polls", polls);
                return Ok(polls);
            }
            self.check(started)?;
            self.tick().await;
        }
    }

    /// Block until `condition` holds. Encoder conditions reset their counter first.
    pub async fn wait_for<H: Hub>(
        &self,
        condition: &WaitCondition,
        hub: &mut H,
        config: &RobotConfig,
    ) -> Result<u32> {
        if let WaitCondition::UntilEncoderAbs { motor, .. } = condition {
            hub.reset_relative_position(drive_motor(config, *motor))?;
        }
        self.wait_until(|| condition.is_met(hub, config)).await
    }

    /// Cancellable sleep. Pauses are deliberate and never time out.
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        let end = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return Err(MissionError::Cancelled);
            }
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            sleep((end - now).min(self.poll_interval)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Port, SimHub};

    fn gate(timeout: Option<Duration>) -> SensorGate {
        SensorGate::new(Duration::from_millis(10), timeout, CancelToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_on_nth_poll() {
        let gate = gate(None);
        let mut evaluations = 0;
        let started = Instant::now();

        let polls = gate
            .wait_until(|| {
                evaluations += 1;
                Ok(evaluations == 5)
            })
            .await
            .unwrap();

        assert_eq!(polls, 5);
        assert_eq!(evaluations, 5);
        // Four yields between five evaluations
        assert_eq!(started.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let gate = gate(Some(Duration::from_millis(50)));
        let result = gate.wait_until(|| Ok(false)).await;
        match result {
            Err(MissionError::SensorTimeout { waited }) => {
                assert_eq!(waited, Duration::from_millis(50))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_observes_cancellation() {
        let gate = gate(None);
        let token = gate.cancel_token().clone();
        let mut evaluations = 0;

        let result = gate
            .wait_until(|| {
                evaluations += 1;
                if evaluations == 3 {
                    token.cancel();
                }
                Ok(false)
            })
            .await;

        assert!(matches!(result, Err(MissionError::Cancelled)));
        assert_eq!(evaluations, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_distance_never_satisfies() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new().with_distances([None, None, Some(800), None, Some(499)]);
        let condition = WaitCondition::UntilDistanceBelow(500);

        for _ in 0..4 {
            assert!(!condition.is_met(&mut hub, &config).unwrap());
        }
        assert!(condition.is_met(&mut hub, &config).unwrap());
    }

    #[test]
    fn test_unavailable_sensor_is_not_met() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new()
            .with_unavailable(config.color_sensor)
            .with_unavailable(config.distance_sensor);
        for condition in [
            WaitCondition::UntilColor(Color::Black),
            WaitCondition::UntilColorNot(Color::Black),
            WaitCondition::UntilDistanceBelow(500),
        ] {
            assert!(!condition.is_met(&mut hub, &config).unwrap(), "{:?}", condition);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_sensor_keeps_polling_until_timeout() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new().with_unavailable(config.color_sensor);
        let result = gate(Some(Duration::from_millis(50)))
            .wait_for(&WaitCondition::UntilColorNot(Color::White), &mut hub, &config)
            .await;
        assert!(matches!(result, Err(MissionError::SensorTimeout { .. })));
        assert_eq!(hub.color_reads(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_distance_times_out() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new();
        let result = gate(Some(Duration::from_millis(100)))
            .wait_for(&WaitCondition::UntilDistanceBelow(500), &mut hub, &config)
            .await;
        assert!(matches!(result, Err(MissionError::SensorTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_color() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new().with_colors([
            Color::White,
            Color::White,
            Color::Black,
            Color::White,
            Color::Red,
        ]);
        let polls = gate(None)
            .wait_for(&WaitCondition::UntilColor(Color::Black), &mut hub, &config)
            .await
            .unwrap();
        assert_eq!(polls, 3);

        let polls = gate(None)
            .wait_for(&WaitCondition::UntilColorNot(Color::White), &mut hub, &config)
            .await
            .unwrap();
        assert_eq!(polls, 2);
        assert_eq!(hub.color_reads(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_wait_resets_counter() {
        let config = RobotConfig::default();
        let mut hub = SimHub::new();
        hub.pair(Port::F, Port::B).await.unwrap();
        hub.move_for_degrees(1000, 0, 500).await.unwrap();
        hub.move_pair(0, 1000).await.unwrap();

        let started = Instant::now();
        gate(None)
            .wait_for(
                &WaitCondition::UntilEncoderAbs {
                    motor: Side::Right,
                    degrees: 100,
                },
                &mut hub,
                &config,
            )
            .await
            .unwrap();
        // 1000 deg/s needs 100 ms for 100 degrees after the reset
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_cancellable() {
        let gate = gate(None);
        let started = Instant::now();
        gate.pause(Duration::from_millis(25)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(25));

        gate.cancel_token().cancel();
        assert!(matches!(
            gate.pause(Duration::from_secs(5)).await,
            Err(MissionError::Cancelled)
        ));
    }
}
