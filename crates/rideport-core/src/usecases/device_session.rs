//! Device session - one device's download workflow
//!
//! A [`DeviceSession`] binds a port to a device type and walks the
//! [`SessionState`] machine:
//!
//! ```text
//! Created ──preview──▶ Previewed ──confirm──▶ RidesSelected ──download──▶ Transferring
//!    │                                                                      │
//!    └──cleanup──▶ Cleaning ──▶ {Cleaned, Failed}          {Completed, Cancelled, Failed}
//! ```
//!
//! Each stage opens the driver's transport and closes it again before
//! returning, on success, failure and cancellation alike, so a session that
//! is dropped between stages never holds the port.
//!
//! Rides are written into uniquely named `.part` files inside the temporary
//! directory. A ride that fails on its own is dropped and the transfer moves
//! on; a link failure or a cancellation stops the transfer. Rides that were
//! fully written before the stop are still handed back to the caller.

use std::path::Path;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    domain::{
        device::DeviceType,
        errors::DomainError,
        port::Port,
        ride::{DownloadedFile, RideItem},
        workflow::SessionState,
    },
    ports::{
        device_driver::{IDeviceDriver, TransferFault},
        download_observer::IDownloadObserver,
    },
};

/// A ride that could not be transferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RideFailure {
    pub ride: RideItem,
    pub reason: String,
}

impl std::fmt::Display for RideFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.ride, self.reason)
    }
}

/// Outcome of a transfer that ran to the end of the ride list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Rides written to temporary files, in transfer order
    pub files: Vec<DownloadedFile>,
    /// Rides that failed individually
    pub failures: Vec<RideFailure>,
}

/// Errors raised by a device session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport could not be opened or the ride list could not be read
    #[error("{0}")]
    Preview(String),

    /// The transfer stopped before the end of the ride list
    ///
    /// `completed` holds the rides fully written before the failure.
    #[error("{reason}")]
    Transfer {
        reason: String,
        completed: Vec<DownloadedFile>,
        failures: Vec<RideFailure>,
    },

    /// Cancellation was observed at a checkpoint
    #[error("cancelled")]
    Cancelled { completed: Vec<DownloadedFile> },

    /// The device could not erase its storage
    #[error("{0}")]
    Cleanup(String),

    /// The device type cannot erase its storage
    #[error("{0} devices do not support erasing rides")]
    CleanupUnsupported(String),

    /// The operation is not valid in the current session state
    #[error(transparent)]
    State(#[from] DomainError),
}

/// Checks both cancellation sources
async fn cancel_requested(cancel: &CancellationToken, observer: &dyn IDownloadObserver) -> bool {
    cancel.is_cancelled() || observer.is_cancel_requested().await
}

/// Keeps ride keys usable as file name fragments
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// One device's download workflow
pub struct DeviceSession {
    port: Port,
    device_type: DeviceType,
    driver: Box<dyn IDeviceDriver>,
    state: SessionState,
    rides: Vec<RideItem>,
}

impl DeviceSession {
    /// Binds a driver to its port and device type
    pub fn new(port: Port, device_type: DeviceType, driver: Box<dyn IDeviceDriver>) -> Self {
        Self {
            port,
            device_type,
            driver,
            state: SessionState::Created,
            rides: Vec::new(),
        }
    }

    pub fn port(&self) -> &Port {
        &self.port
    }

    pub fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Rides found by the last successful preview
    pub fn rides(&self) -> &[RideItem] {
        &self.rides
    }

    fn transition(&mut self, target: SessionState) -> Result<(), DomainError> {
        self.state = self.state.transition_to(target)?;
        debug!(port = %self.port.id(), state = %self.state, "Session state changed");
        Ok(())
    }

    fn require(&self, expected: SessionState, target: SessionState) -> Result<(), DomainError> {
        if self.state != expected {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Err(e) = self.driver.close().await {
            warn!(port = %self.port.id(), error = %e, "Failed to close device transport");
        }
    }

    // ------------------------------------------------------------------------
    // Preview and selection
    // ------------------------------------------------------------------------

    /// Opens the device and reads the list of stored rides
    ///
    /// On failure the session stays `Created` and may be previewed again.
    #[instrument(skip(self, observer), fields(port = %self.port.id(), device = %self.device_type))]
    pub async fn preview(
        &mut self,
        observer: &dyn IDownloadObserver,
    ) -> Result<&[RideItem], SessionError> {
        self.require(SessionState::Created, SessionState::Previewed)?;

        if let Err(e) = self.driver.open().await {
            self.release().await;
            warn!(error = %e, "Failed to open device");
            return Err(SessionError::Preview(format!("{e:#}")));
        }

        let listed = self.driver.list_rides(observer).await;
        self.release().await;

        let rides = listed.map_err(|e| {
            warn!(error = %e, "Failed to list rides");
            SessionError::Preview(format!("{e:#}"))
        })?;

        info!(rides = rides.len(), "Device previewed");
        self.rides = rides;
        self.transition(SessionState::Previewed)?;
        Ok(&self.rides)
    }

    /// Mutable access to the ride list for selection
    ///
    /// Only available between preview and [`DeviceSession::confirm_selection`].
    pub fn rides_mut(&mut self) -> Result<&mut [RideItem], SessionError> {
        self.require(SessionState::Previewed, SessionState::RidesSelected)?;
        Ok(&mut self.rides)
    }

    /// Marks every discovered ride as wanted
    pub fn select_all(&mut self) -> Result<(), SessionError> {
        for ride in self.rides_mut()? {
            ride.wanted = true;
        }
        Ok(())
    }

    /// Marks exactly the rides whose keys are listed as wanted
    pub fn select(&mut self, keys: &[&str]) -> Result<(), SessionError> {
        for ride in self.rides_mut()? {
            ride.wanted = keys.contains(&ride.key());
        }
        Ok(())
    }

    /// Freezes the wanted flags
    pub fn confirm_selection(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::RidesSelected)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    /// Transfers the wanted rides into temporary files under `temp_dir`
    ///
    /// Cancellation is checked before the transport is opened, before every
    /// ride, and by the driver between chunks.
    #[instrument(skip(self, cancel, observer), fields(port = %self.port.id(), device = %self.device_type))]
    pub async fn download(
        &mut self,
        temp_dir: &Path,
        cancel: &CancellationToken,
        observer: &dyn IDownloadObserver,
    ) -> Result<TransferReport, SessionError> {
        self.transition(SessionState::Transferring)?;

        if cancel_requested(cancel, observer).await {
            info!("Download cancelled before transfer started");
            self.transition(SessionState::Cancelled)?;
            return Err(SessionError::Cancelled {
                completed: Vec::new(),
            });
        }

        if let Err(e) = tokio::fs::create_dir_all(temp_dir).await {
            self.transition(SessionState::Failed)?;
            return Err(SessionError::Transfer {
                reason: format!("cannot create {}: {e}", temp_dir.display()),
                completed: Vec::new(),
                failures: Vec::new(),
            });
        }

        if let Err(e) = self.driver.open().await {
            self.release().await;
            self.transition(SessionState::Failed)?;
            return Err(SessionError::Transfer {
                reason: format!("{e:#}"),
                completed: Vec::new(),
                failures: Vec::new(),
            });
        }

        let wanted: Vec<RideItem> = self.rides.iter().filter(|r| r.wanted).cloned().collect();
        let total = wanted.len();
        let mut report = TransferReport::default();
        let mut stop: Option<TransferFault> = None;

        for (index, ride) in wanted.iter().enumerate() {
            if cancel_requested(cancel, observer).await {
                stop = Some(TransferFault::Cancelled);
                break;
            }

            observer
                .report_status(&format!("downloading {} ({}/{})", ride, index + 1, total))
                .await;

            match self.transfer_one(ride, temp_dir, cancel, observer).await {
                Ok(file) => report.files.push(file),
                Err(fault) if fault.is_fatal() => {
                    stop = Some(fault);
                    break;
                }
                Err(fault) => {
                    let reason = fault.to_string();
                    warn!(ride = %ride.key(), reason = %reason, "Ride transfer failed");
                    observer
                        .report_status(&format!("failed to download {ride}: {reason}"))
                        .await;
                    report.failures.push(RideFailure {
                        ride: ride.clone(),
                        reason,
                    });
                }
            }
        }

        self.release().await;
        observer.report_progress("").await;

        match stop {
            None => {
                info!(
                    files = report.files.len(),
                    failures = report.failures.len(),
                    "Transfer completed"
                );
                self.transition(SessionState::Completed)?;
                Ok(report)
            }
            Some(TransferFault::Cancelled) => {
                info!(completed = report.files.len(), "Transfer cancelled");
                self.transition(SessionState::Cancelled)?;
                Err(SessionError::Cancelled {
                    completed: report.files,
                })
            }
            Some(fault) => {
                warn!(error = %fault, completed = report.files.len(), "Transfer aborted");
                self.transition(SessionState::Failed)?;
                Err(SessionError::Transfer {
                    reason: fault.to_string(),
                    completed: report.files,
                    failures: report.failures,
                })
            }
        }
    }

    /// Streams one ride into a fresh `.part` file
    ///
    /// The partial file is removed on every failure.
    async fn transfer_one(
        &mut self,
        ride: &RideItem,
        temp_dir: &Path,
        cancel: &CancellationToken,
        observer: &dyn IDownloadObserver,
    ) -> Result<DownloadedFile, TransferFault> {
        let temp_path = temp_dir.join(format!(
            ".{}.{}.{}.part",
            sanitize_key(ride.key()),
            &Uuid::new_v4().simple().to_string()[..8],
            ride.extension()
        ));

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
            TransferFault::Link(format!("cannot create {}: {e}", temp_path.display()))
        })?;

        let result = match self
            .driver
            .fetch_ride(ride, &mut file, observer, cancel)
            .await
        {
            Ok(bytes) => match file.flush().await {
                Ok(()) => {
                    debug!(ride = %ride.key(), bytes, path = ?temp_path, "Ride written");
                    Ok(())
                }
                Err(e) => Err(TransferFault::Ride(format!("write failed: {e}"))),
            },
            Err(fault) => Err(fault),
        };
        drop(file);

        match result {
            Ok(()) => Ok(DownloadedFile::from_ride(ride, temp_path)),
            Err(fault) => {
                discard_partial(&temp_path).await;
                Err(fault)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------------

    /// Erases the rides stored on the device
    ///
    /// Cancellation is checked once, before the transport is opened. An erase
    /// already under way runs to completion.
    #[instrument(skip(self, cancel, observer), fields(port = %self.port.id(), device = %self.device_type))]
    pub async fn cleanup(
        &mut self,
        cancel: &CancellationToken,
        observer: &dyn IDownloadObserver,
    ) -> Result<(), SessionError> {
        if !self.device_type.supports_cleanup() {
            return Err(SessionError::CleanupUnsupported(
                self.device_type.name().to_string(),
            ));
        }
        self.transition(SessionState::Cleaning)?;

        if cancel_requested(cancel, observer).await {
            info!("Erase cancelled before the device was opened");
            self.transition(SessionState::Cancelled)?;
            return Err(SessionError::Cancelled {
                completed: Vec::new(),
            });
        }

        let result = match self.driver.open().await {
            Ok(()) => self.driver.erase().await,
            Err(e) => Err(e),
        };
        self.release().await;

        match result {
            Ok(()) => {
                info!("Device storage erased");
                self.transition(SessionState::Cleaned)?;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to erase device storage");
                self.transition(SessionState::Failed)?;
                Err(SessionError::Cleanup(format!("{e:#}")))
            }
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("port", &self.port)
            .field("device_type", &self.device_type)
            .field("state", &self.state)
            .field("rides", &self.rides.len())
            .finish()
    }
}

/// Removes a temporary file, ignoring a file that is already gone
pub(crate) async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(?path, "Removed temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "Failed to remove temporary file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("2024/01 ride#3"), "2024_01_ride_3");
        assert_eq!(sanitize_key("abc-12"), "abc-12");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Transfer {
            reason: "port closed".into(),
            completed: Vec::new(),
            failures: Vec::new(),
        };
        assert_eq!(err.to_string(), "port closed");
        assert_eq!(
            SessionError::CleanupUnsupported("PTap".into()).to_string(),
            "PTap devices do not support erasing rides"
        );
    }
}
