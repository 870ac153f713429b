//! Download observer port (driving side: the user interface)
//!
//! The observer is the only channel between a running workflow and the user.
//! Every `report_*` call and every cancellation check is an `.await` point,
//! so a UI sharing the runtime gets a chance to render and to issue a cancel
//! while a transfer is running.

use serde::{Deserialize, Serialize};

use crate::domain::ride::RideItem;

/// Answer to "this ride is already in the library"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteDecision {
    /// Replace the library file with the new download
    Overwrite,
    /// Keep the library file and drop the new download
    Skip,
}

impl std::fmt::Display for OverwriteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverwriteDecision::Overwrite => write!(f, "overwrite"),
            OverwriteDecision::Skip => write!(f, "skip"),
        }
    }
}

/// Port trait for the user-facing side of a download
#[async_trait::async_trait]
pub trait IDownloadObserver: Send + Sync {
    /// Appends a line to the status log
    async fn report_status(&self, text: &str);

    /// Replaces the single-line progress indicator
    ///
    /// An empty string clears it.
    async fn report_progress(&self, text: &str);

    /// Asks whether an existing library file should be replaced
    ///
    /// `existing` describes the ride (its start time) in human-readable form.
    async fn resolve_overwrite_conflict(&self, existing: &str) -> OverwriteDecision;

    /// Returns true if the user asked to stop the running operation
    async fn is_cancel_requested(&self) -> bool {
        false
    }

    /// Lets the user choose which rides to transfer
    ///
    /// Only consulted when automatic selection is turned off. The default
    /// marks every ride as wanted.
    async fn select_rides(&self, rides: &mut [RideItem]) {
        for ride in rides.iter_mut() {
            ride.wanted = true;
        }
    }
}
