//! Workflow and session state machines
//!
//! [`WorkflowState`] is the orchestrator-visible state that drives which user
//! actions are available ([`ActionSet`]). [`SessionState`] tracks one device
//! session through preview, selection and transfer (or cleanup).

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// WorkflowState and the action table
// ============================================================================

/// Orchestrator-visible state of the download workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Ports are available and no operation is running
    Idle,
    /// The last scan found no ports
    Missing,
    /// A download is running
    Downloading,
    /// An on-device erase is running
    Cleaning,
}

impl WorkflowState {
    /// Returns true while a device operation is running
    pub fn is_active(&self) -> bool {
        matches!(self, WorkflowState::Downloading | WorkflowState::Cleaning)
    }

    /// Actions the user may trigger in this state
    ///
    /// `supports_cleanup` is the capability of the currently chosen device
    /// type; it only matters while `Idle`.
    pub fn allowed_actions(&self, supports_cleanup: bool) -> ActionSet {
        match self {
            WorkflowState::Missing => ActionSet {
                download: false,
                erase: false,
                rescan: true,
                cancel: false,
                close: true,
                choose_port: false,
                choose_device_type: true,
            },
            WorkflowState::Idle => ActionSet {
                download: true,
                erase: supports_cleanup,
                rescan: true,
                cancel: false,
                close: true,
                choose_port: true,
                choose_device_type: true,
            },
            WorkflowState::Downloading | WorkflowState::Cleaning => ActionSet {
                download: false,
                erase: false,
                rescan: false,
                cancel: true,
                close: false,
                choose_port: false,
                choose_device_type: false,
            },
        }
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        WorkflowState::Idle
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Missing => "missing",
            WorkflowState::Downloading => "downloading",
            WorkflowState::Cleaning => "cleaning",
        };
        write!(f, "{}", s)
    }
}

/// User actions enabled for a given [`WorkflowState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    pub download: bool,
    pub erase: bool,
    pub rescan: bool,
    pub cancel: bool,
    pub close: bool,
    pub choose_port: bool,
    pub choose_device_type: bool,
}

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle of a single device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Bound to a port, transport not yet opened
    Created,
    /// Rides have been enumerated from the device
    Previewed,
    /// The wanted flags are frozen
    RidesSelected,
    /// Rides are being copied off the device
    Transferring,
    /// Transfer finished (individual rides may still have failed)
    Completed,
    /// Transfer or cleanup stopped at a cancellation checkpoint
    Cancelled,
    /// Transfer or cleanup aborted
    Failed,
    /// On-device storage is being erased
    Cleaning,
    /// On-device storage was erased
    Cleaned,
}

impl SessionState {
    /// Returns the state name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Previewed => "previewed",
            SessionState::RidesSelected => "rides_selected",
            SessionState::Transferring => "transferring",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
            SessionState::Cleaning => "cleaning",
            SessionState::Cleaned => "cleaned",
        }
    }

    /// Checks whether moving to `target` is allowed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Created, Previewed) | (Created, Cleaning) => true,

            (Previewed, RidesSelected) | (Previewed, Cancelled) => true,

            (RidesSelected, Transferring) | (RidesSelected, Cancelled) => true,

            (Transferring, Completed) | (Transferring, Cancelled) | (Transferring, Failed) => {
                true
            }

            (Cleaning, Cleaned) | (Cleaning, Cancelled) | (Cleaning, Failed) => true,

            _ => false,
        }
    }

    /// Validates and returns the next state
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(self, target: SessionState) -> Result<SessionState, DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        Ok(target)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
