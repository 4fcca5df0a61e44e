use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::{
    domain::{CalibrationState, DotBot, Lh2Position, RgbLed, RobotAddress, CALIBRATION_POINT_COUNT},
    protocol::StatusUpdate,
};
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

pub mod calibration;
pub mod transport;

pub use calibration::{CalibrationError, CalibrationWizard};
pub use transport::{spawn_status_stream, HttpControllerApi};

/// Request/response surface of the controller backend.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    async fn fetch_dotbots(&self) -> Result<Vec<DotBot>>;
    async fn fetch_active_address(&self) -> Result<RobotAddress>;
    async fn set_active_address(&self, address: &RobotAddress) -> Result<()>;
    async fn set_rgb_led(&self, address: &RobotAddress, color: RgbLed) -> Result<()>;
    async fn fetch_calibration_state(&self) -> Result<CalibrationState>;
    async fn add_calibration_point(&self, index: usize) -> Result<()>;
    async fn apply_calibration(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    RegistryReplaced,
    PositionUpdated {
        address: RobotAddress,
        position: Lh2Position,
    },
    ActiveChanged(RobotAddress),
    PendingColorChanged(RgbLed),
    CalibrationChanged(CalibrationState),
    StreamConnected,
    StreamClosed,
    Error(String),
}

struct ControllerState {
    robots: Vec<DotBot>,
    active: RobotAddress,
    pending_color: RgbLed,
}

/// Reconciles snapshot fetches, on-demand re-fetches and the push
/// stream into one view of robot state. Everything mutates behind one
/// mutex, so updates apply in arrival order; whichever lands last wins.
pub struct ControllerClient {
    api: Arc<dyn ControllerApi>,
    inner: Mutex<ControllerState>,
    calibration: Mutex<CalibrationWizard>,
    events: broadcast::Sender<ClientEvent>,
}

impl ControllerClient {
    pub fn new(api: Arc<dyn ControllerApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            api,
            inner: Mutex::new(ControllerState {
                robots: Vec::new(),
                active: RobotAddress::inactive(),
                pending_color: RgbLed::default(),
            }),
            calibration: Mutex::new(CalibrationWizard::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub async fn robots(&self) -> Vec<DotBot> {
        self.inner.lock().await.robots.clone()
    }

    pub async fn active_address(&self) -> RobotAddress {
        self.inner.lock().await.active.clone()
    }

    pub async fn pending_color(&self) -> RgbLed {
        self.inner.lock().await.pending_color
    }

    pub async fn calibration_state(&self) -> CalibrationState {
        self.calibration.lock().await.state()
    }

    pub async fn calibration_points(&self) -> [bool; CALIBRATION_POINT_COUNT] {
        *self.calibration.lock().await.points()
    }

    /// One full registry fetch plus one active-address fetch. Runs on
    /// stream open, on a `reload` push message and after a color apply.
    /// The registry swap lands even when the active-address fetch fails.
    pub async fn refresh(&self) -> Result<()> {
        let robots = self.api.fetch_dotbots().await?;
        {
            let mut state = self.inner.lock().await;
            state.robots = robots;
        }
        self.emit(ClientEvent::RegistryReplaced);

        let active = self.api.fetch_active_address().await?;
        let color = {
            let mut state = self.inner.lock().await;
            state.active = active.clone();
            state.pending_color = pending_color_for(&state.robots, &state.active);
            state.pending_color
        };
        self.emit(ClientEvent::ActiveChanged(active));
        self.emit(ClientEvent::PendingColorChanged(color));
        Ok(())
    }

    pub async fn toggle_active(&self, address: RobotAddress) -> Result<()> {
        let target = if self.inner.lock().await.active == address {
            RobotAddress::inactive()
        } else {
            address
        };
        self.set_active(target).await
    }

    /// Non-optimistic: the selection is only mirrored locally once the
    /// backend has acknowledged it.
    pub async fn set_active(&self, address: RobotAddress) -> Result<()> {
        self.api.set_active_address(&address).await?;
        let color = {
            let mut state = self.inner.lock().await;
            state.active = address.clone();
            state.pending_color = pending_color_for(&state.robots, &state.active);
            state.pending_color
        };
        self.emit(ClientEvent::ActiveChanged(address));
        self.emit(ClientEvent::PendingColorChanged(color));
        Ok(())
    }

    pub async fn preview_color(&self, color: RgbLed) {
        self.inner.lock().await.pending_color = color;
        self.emit(ClientEvent::PendingColorChanged(color));
    }

    /// Send the pending color to the active robot, then re-sync instead
    /// of assuming success.
    pub async fn apply_color(&self) -> Result<()> {
        let (active, color) = {
            let state = self.inner.lock().await;
            (state.active.clone(), state.pending_color)
        };
        if active.is_inactive() {
            bail!("no active robot to apply a color to");
        }
        self.api.set_rgb_led(&active, color).await?;
        self.refresh().await
    }

    pub async fn refresh_calibration(&self) -> CalibrationState {
        let state = match self.api.fetch_calibration_state().await {
            Ok(state) => state,
            Err(err) => {
                warn!("calibration state fetch failed, assuming unknown: {err}");
                CalibrationState::Unknown
            }
        };
        self.calibration.lock().await.sync_remote(state);
        self.emit(ClientEvent::CalibrationChanged(state));
        state
    }

    /// Purely local; the backend learns about the run point by point.
    pub async fn start_calibration(&self) -> Result<(), CalibrationError> {
        self.calibration.lock().await.start()?;
        self.emit(ClientEvent::CalibrationChanged(CalibrationState::Running));
        Ok(())
    }

    /// The backend send is fire-and-forget; only the local transition
    /// can fail.
    pub async fn acknowledge_calibration_point(
        &self,
        index: usize,
    ) -> Result<CalibrationState, CalibrationError> {
        let state = self.calibration.lock().await.acknowledge(index)?;
        if let Err(err) = self.api.add_calibration_point(index).await {
            warn!("calibration point {index} not delivered: {err}");
        }
        if state == CalibrationState::Ready {
            self.emit(ClientEvent::CalibrationChanged(state));
        }
        Ok(state)
    }

    /// The transition to done is not rolled back when the commit fails.
    pub async fn apply_calibration(&self) -> Result<(), CalibrationError> {
        self.calibration.lock().await.apply()?;
        self.emit(ClientEvent::CalibrationChanged(CalibrationState::Done));
        if let Err(err) = self.api.apply_calibration().await {
            warn!("calibration commit failed: {err}");
        }
        Ok(())
    }

    pub async fn handle_status_update(&self, update: StatusUpdate) {
        match update {
            StatusUpdate::Reload => {
                if let Err(err) = self.refresh().await {
                    warn!("reload-triggered refresh failed: {err}");
                    self.emit(ClientEvent::Error(err.to_string()));
                }
            }
            StatusUpdate::Lh2Position { address, x, y } => {
                self.apply_position_update(address, x, y).await;
            }
            StatusUpdate::Unknown => {}
        }
    }

    // Unknown addresses and an empty registry are normal no-ops; the
    // collection is never reordered or resized here.
    async fn apply_position_update(&self, address: RobotAddress, x: f32, y: f32) {
        let position = Lh2Position { x, y };
        {
            let mut state = self.inner.lock().await;
            let Some(robot) = state
                .robots
                .iter_mut()
                .find(|robot| robot.address == address)
            else {
                return;
            };
            robot.lh2_position = Some(position);
        }
        self.emit(ClientEvent::PositionUpdated { address, position });
    }
}

fn pending_color_for(robots: &[DotBot], active: &RobotAddress) -> RgbLed {
    if active.is_inactive() {
        return RgbLed::default();
    }
    robots
        .iter()
        .find(|robot| &robot.address == active)
        .and_then(|robot| robot.rgb_led)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
