use shared::domain::{CalibrationState, CALIBRATION_POINT_COUNT};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("calibration can only start from unknown or done, current state is {0:?}")]
    Start(CalibrationState),
    #[error("calibration points can only be acknowledged while running, current state is {0:?}")]
    NotRunning(CalibrationState),
    #[error("calibration point index {0} is out of range 0..{CALIBRATION_POINT_COUNT}")]
    PointIndex(usize),
    #[error("calibration can only be applied from ready, current state is {0:?}")]
    Apply(CalibrationState),
}

/// State machine for the 9-point LH2 calibration procedure. Every
/// transition validates the current state itself and fails with a typed
/// error on illegal calls; backend calls are layered on top by
/// `ControllerClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationWizard {
    state: CalibrationState,
    points: [bool; CALIBRATION_POINT_COUNT],
}

impl Default for CalibrationWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationWizard {
    pub fn new() -> Self {
        Self {
            state: CalibrationState::Unknown,
            points: [false; CALIBRATION_POINT_COUNT],
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn points(&self) -> &[bool; CALIBRATION_POINT_COUNT] {
        &self.points
    }

    /// Mirror a backend-reported state. `Ready` implies all points
    /// acknowledged; any other state discards leftover flags.
    pub fn sync_remote(&mut self, state: CalibrationState) {
        self.state = state;
        self.points = [state == CalibrationState::Ready; CALIBRATION_POINT_COUNT];
    }

    pub fn start(&mut self) -> Result<(), CalibrationError> {
        match self.state {
            CalibrationState::Unknown | CalibrationState::Done => {
                self.points = [false; CALIBRATION_POINT_COUNT];
                self.state = CalibrationState::Running;
                Ok(())
            }
            current => Err(CalibrationError::Start(current)),
        }
    }

    /// Re-acknowledging a mark is a no-op. Returns the state after
    /// evaluation: `Ready` exactly when the 9th distinct mark lands.
    pub fn acknowledge(&mut self, index: usize) -> Result<CalibrationState, CalibrationError> {
        if self.state != CalibrationState::Running {
            return Err(CalibrationError::NotRunning(self.state));
        }
        if index >= CALIBRATION_POINT_COUNT {
            return Err(CalibrationError::PointIndex(index));
        }
        self.points[index] = true;
        if self.points.iter().all(|&acked| acked) {
            self.state = CalibrationState::Ready;
        }
        Ok(self.state)
    }

    /// The transition to `Done` is unconditional; the backend commit
    /// happens afterwards and does not roll it back.
    pub fn apply(&mut self) -> Result<(), CalibrationError> {
        if self.state != CalibrationState::Ready {
            return Err(CalibrationError::Apply(self.state));
        }
        self.state = CalibrationState::Done;
        Ok(())
    }
}
