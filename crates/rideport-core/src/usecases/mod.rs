//! Use cases - application workflows built on the domain and ports
//!
//! - [`device_session`]: one device's preview / transfer / cleanup
//! - [`finalize`]: moving downloaded files into the library
//! - [`download_rides`]: the orchestrator the user interface drives

pub mod device_session;
pub mod download_rides;
pub mod finalize;

pub use device_session::{DeviceSession, RideFailure, SessionError, TransferReport};
pub use download_rides::{
    CancelHandle, DownloadError, DownloadOrchestrator, DownloadSummary, OrchestratorOptions,
};
pub use finalize::{FinalizeOutcome, RideFinalizer};
