//! Lifecycle states of a Doppler processing unit.

use crate::error::{DopplerError, DopplerResult};

/// Where a unit handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnitState {
    /// Initialized, no plan yet.
    #[default]
    Idle,
    /// A descriptor plan is installed.
    Ready,
    /// A frame is in flight, or a frame failed and the handle awaits deinit.
    Running,
    /// Resources released; every further call is rejected.
    Released,
}

impl UnitState {
    /// Whether `config` may run from this state.
    pub fn check_configurable(self) -> DopplerResult<()> {
        match self {
            UnitState::Idle | UnitState::Ready => Ok(()),
            UnitState::Running => Err(DopplerError::InProgress),
            UnitState::Released => Err(DopplerError::InvalidArgument("handle released")),
        }
    }

    /// Whether `process` may run from this state.
    pub fn check_processable(self) -> DopplerResult<()> {
        match self {
            UnitState::Ready => Ok(()),
            UnitState::Idle => Err(DopplerError::NotConfigured),
            UnitState::Running => Err(DopplerError::InProgress),
            UnitState::Released => Err(DopplerError::InvalidArgument("handle released")),
        }
    }

    pub fn is_released(self) -> bool {
        self == UnitState::Released
    }
}
