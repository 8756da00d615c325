// Hub bridge over Zenoh
//
// Commands go out as JSON `HubCommand`s; the bridge on the hub side streams
// `HubState` snapshots back. Reads drain whatever snapshots are pending and
// keep the latest, so every read is a single fresh sample.
//
// Each `ZenohHub` pairs under a fresh session number. Completion acks are only
// trusted from snapshots carrying that session, so a bridge that outlived an
// earlier runtime cannot release a blocking motion early.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::{Publisher, Subscriber};
use zenoh::sample::Sample;

use super::{Color, Hub, Port, Result, StopMode};
use crate::config::{RobotConfig, TOPIC_HUB_CMD, TOPIC_HUB_STATE, TOPIC_MISSION_STATUS};
use crate::error::HubError;
use crate::messages::{HubCommand, HubState, MissionStatus};

fn transport(e: zenoh::Error) -> HubError {
    HubError::Transport(e.to_string())
}

fn new_session() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
        .max(1)
}

/// The bridge has accepted our `Pair`
fn in_session(state: &HubState, session: u64) -> bool {
    state.session == session
}

/// Blocking motion `id` of `session` has completed
fn acknowledged(state: &HubState, session: u64, id: u64) -> bool {
    in_session(state, session) && state.completed >= id
}

pub struct ZenohHub {
    // Publishers and subscriber are undeclared when the session drops
    _session: zenoh::Session,
    pub_cmd: Publisher<'static>,
    pub_status: Publisher<'static>,
    sub_state: Subscriber<FifoChannelHandler<Sample>>,
    latest: Option<HubState>,
    offsets: [i32; 6],
    session: u64,
    next_id: u64,
    poll_interval: Duration,
    motion_timeout: Duration,
}

impl ZenohHub {
    pub async fn open(config: &RobotConfig) -> Result<Self> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default())
            .await
            .map_err(transport)?;

        let sub_state = session
            .declare_subscriber(TOPIC_HUB_STATE)
            .await
            .map_err(transport)?;
        let pub_cmd = session
            .declare_publisher(TOPIC_HUB_CMD)
            .await
            .map_err(transport)?;
        let pub_status = session
            .declare_publisher(TOPIC_MISSION_STATUS)
            .await
            .map_err(transport)?;

        info!("Subscribed to: {}", TOPIC_HUB_STATE);
        info!("Publishing to: {}, {}", TOPIC_HUB_CMD, TOPIC_MISSION_STATUS);

        Ok(Self {
            _session: session,
            pub_cmd,
            pub_status,
            sub_state,
            latest: None,
            offsets: [0; 6],
            session: new_session(),
            next_id: 1,
            poll_interval: config.poll_interval(),
            motion_timeout: config.motion_timeout(),
        })
    }

    /// Drain pending snapshots (non-blocking), keep latest
    fn refresh(&mut self) {
        while let Ok(Some(sample)) = self.sub_state.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<HubState>(&payload) {
                Ok(state) => self.latest = Some(state),
                Err(e) => warn!("Failed to parse hub state: {}", e),
            }
        }
    }

    fn state(&mut self, port: Port) -> Result<&HubState> {
        self.refresh();
        self.latest
            .as_ref()
            .ok_or(HubError::SensorUnavailable { port })
    }

    async fn send(&self, cmd: &HubCommand) -> Result<()> {
        let json = serde_json::to_string(cmd)?;
        debug!("-> {}", json);
        self.pub_cmd.put(json).await.map_err(transport)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Poll snapshots until one satisfies `ready`; false on timeout
    async fn await_state(&mut self, ready: impl Fn(&HubState) -> bool) -> bool {
        let deadline = Instant::now() + self.motion_timeout;
        loop {
            self.refresh();
            if self.latest.as_ref().is_some_and(&ready) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Wait until the bridge acknowledges blocking motion `id`
    async fn await_completion(&mut self, id: u64) -> Result<()> {
        let session = self.session;
        if self.await_state(move |s| acknowledged(s, session, id)).await {
            Ok(())
        } else {
            Err(HubError::MotionTimeout {
                id,
                timeout: self.motion_timeout,
            })
        }
    }
}

impl Hub for ZenohHub {
    /// Returns once a snapshot of the new session arrives, so reads after
    /// pairing always have a state to sample
    async fn pair(&mut self, left: Port, right: Port) -> Result<()> {
        info!(
            "Pairing drive motors left={:?} right={:?}, session {}",
            left, right, self.session
        );
        self.send(&HubCommand::Pair {
            left,
            right,
            session: self.session,
        })
        .await?;

        let session = self.session;
        if self.await_state(move |s| in_session(s, session)).await {
            Ok(())
        } else {
            Err(HubError::SessionTimeout {
                session,
                timeout: self.motion_timeout,
            })
        }
    }

    async fn move_for_degrees(&mut self, degrees: i32, steering: i32, velocity: i32) -> Result<()> {
        let id = self.allocate_id();
        self.send(&HubCommand::MoveForDegrees {
            id,
            degrees,
            steering,
            velocity,
        })
        .await?;
        self.await_completion(id).await
    }

    async fn move_tank(&mut self, left: i32, right: i32) -> Result<()> {
        self.send(&HubCommand::MoveTank { left, right }).await
    }

    async fn move_pair(&mut self, steering: i32, velocity: i32) -> Result<()> {
        self.send(&HubCommand::Move { steering, velocity }).await
    }

    async fn stop_pair(&mut self) -> Result<()> {
        self.send(&HubCommand::StopPair).await
    }

    async fn run_motor(&mut self, port: Port, velocity: i32) -> Result<()> {
        self.send(&HubCommand::RunMotor { port, velocity }).await
    }

    async fn stop_motor(&mut self, port: Port, mode: StopMode) -> Result<()> {
        self.send(&HubCommand::StopMotor { port, mode }).await
    }

    async fn run_motor_for_degrees(&mut self, port: Port, degrees: i32, velocity: i32) -> Result<()> {
        let id = self.allocate_id();
        self.send(&HubCommand::RunMotorForDegrees {
            id,
            port,
            degrees,
            velocity,
        })
        .await?;
        self.await_completion(id).await
    }

    fn reset_relative_position(&mut self, port: Port) -> Result<()> {
        let absolute = self.state(port)?.positions[port.index()];
        self.offsets[port.index()] = absolute;
        Ok(())
    }

    fn relative_position(&mut self, port: Port) -> Result<i32> {
        let absolute = self.state(port)?.positions[port.index()];
        Ok(absolute - self.offsets[port.index()])
    }

    fn color(&mut self, port: Port) -> Result<Color> {
        self.state(port)?
            .color
            .ok_or(HubError::SensorUnavailable { port })
    }

    fn distance(&mut self, port: Port) -> Result<Option<u16>> {
        Ok(self.state(port)?.distance_mm)
    }

    async fn report_status(&mut self, status: &MissionStatus) -> Result<()> {
        let json = serde_json::to_string(status)?;
        self.pub_status.put(json).await.map_err(transport)
    }
}
