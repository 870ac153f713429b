//! Download orchestrator - drives a device session end to end
//!
//! The orchestrator owns the workflow state the user interface renders
//! ([`WorkflowState`] and its [`ActionSet`]), the result of the last port scan,
//! and the current port / device-type choice. `download` runs
//! preview → selection → transfer → finalize; `erase` runs a cleanup session.
//!
//! ## Cancellation
//!
//! [`CancelHandle::cancel`] is ignored while `Idle` or `Missing`. While a
//! download or erase is running it trips the token the session polls at its
//! checkpoints. Every state change installs a fresh token, so a cancel never
//! leaks into the next operation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{ChipsetHint, Config},
    domain::{
        port::{Port, PortScan},
        ride::DownloadedFile,
        workflow::{ActionSet, WorkflowState},
    },
    ports::{
        download_observer::{IDownloadObserver, OverwriteDecision},
        port_enumerator::IPortEnumerator,
        ride_library::IRideLibrary,
    },
    registry::{DeviceRegistry, RegistryError},
};

use super::{
    device_session::{discard_partial, DeviceSession, RideFailure, SessionError},
    finalize::{FinalizeOutcome, RideFinalizer},
};

const NO_DEVICES_TEXT: &str = "No devices found. Make sure the device unit is plugged into \
     the computer, then click \"Rescan\" to check again.";

const DRIVER_HINT_TEXT: &str =
    "You may need to (re)install the FTDI or PL2303 drivers before downloading.";

// ============================================================================
// Errors and results
// ============================================================================

/// Errors raised by the download workflow
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No port is available to download from
    #[error("no port selected")]
    NoPortSelected,

    /// The requested port was not in the last scan
    #[error("port not found: {0}")]
    PortNotFound(String),

    /// The chosen device type cannot be reached through the port
    #[error("{device_type} devices cannot be reached through {port}")]
    PortUnsupported { port: String, device_type: String },

    /// Device-type lookup failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The action is not available in the current workflow state
    #[error("cannot {action} while {state}")]
    Busy {
        action: &'static str,
        state: WorkflowState,
    },

    /// The device could not be opened or its rides listed
    #[error("preview failed: {0}")]
    PreviewFailed(String),

    /// The transfer stopped before the end of the ride list
    #[error("download failed: {0}")]
    TransferFailed(String),

    /// The user cancelled the running download or erase
    #[error("cancelled by user")]
    Cancelled,

    /// The device could not erase its storage
    #[error("erase failed: {0}")]
    CleanupFailed(String),

    /// Session misuse (state machine violation)
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result of a download that reached the finalize step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Library file names committed, in order
    pub committed: Vec<String>,
    /// Library file names skipped because they already existed
    pub skipped: Vec<String>,
    /// Rides that failed to transfer
    pub ride_failures: Vec<RideFailure>,
    /// Library file names that could not be committed
    pub finalize_failures: Vec<String>,
}

impl DownloadSummary {
    /// Rides that failed either in transfer or in finalize
    pub fn failures(&self) -> usize {
        self.ride_failures.len() + self.finalize_failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

// ============================================================================
// Options
// ============================================================================

/// Behaviour switches for [`DownloadOrchestrator`]
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Where `.part` files are written
    pub temp_dir: PathBuf,
    /// Select every ride instead of asking the observer
    pub auto_select_all: bool,
    /// Fixed answer to overwrite conflicts; `None` asks the observer
    pub overwrite_policy: Option<OverwriteDecision>,
    /// Keep temporary files whose commit failed
    pub keep_failed_temp_files: bool,
    /// Chipset heuristics applied after each scan
    pub chipset_hints: Vec<ChipsetHint>,
    /// Device type chosen at startup, if registered
    pub default_type: Option<String>,
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_dir: config.temp_dir(),
            auto_select_all: config.download.auto_select_all,
            overwrite_policy: config.overwrite_policy(),
            keep_failed_temp_files: config.download.keep_failed_temp_files,
            chipset_hints: config.devices.chipset_hints.clone(),
            default_type: config.devices.default_type.clone(),
        }
    }
}

// ============================================================================
// CancelHandle
// ============================================================================

#[derive(Debug)]
struct Control {
    state: WorkflowState,
    token: CancellationToken,
}

/// Cloneable handle for requesting cancellation from another task
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<Mutex<Control>>,
}

impl CancelHandle {
    fn new(state: WorkflowState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Control {
                state,
                token: CancellationToken::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Control> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Requests cancellation of the running operation
    ///
    /// Returns true if the request was accepted (a download or erase is running).
    pub fn cancel(&self) -> bool {
        let control = self.lock();
        if !control.state.is_active() {
            debug!(state = %control.state, "Cancel ignored");
            return false;
        }
        info!(state = %control.state, "Cancel requested");
        control.token.cancel();
        true
    }

    /// The current workflow state
    pub fn state(&self) -> WorkflowState {
        self.lock().state
    }

    /// Changes state and returns the fresh token for the new state
    fn enter(&self, state: WorkflowState) -> CancellationToken {
        let mut control = self.lock();
        debug!(from = %control.state, to = %state, "Workflow state changed");
        control.state = state;
        control.token = CancellationToken::new();
        control.token.clone()
    }
}

// ============================================================================
// DownloadOrchestrator
// ============================================================================

/// Drives ride downloads and device erases for the user interface
pub struct DownloadOrchestrator {
    registry: DeviceRegistry,
    enumerator: Arc<dyn IPortEnumerator>,
    library: Arc<dyn IRideLibrary>,
    options: OrchestratorOptions,
    ports: Vec<Port>,
    selected_port: Option<String>,
    device_type: String,
    control: CancelHandle,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator in the `Missing` state; call [`Self::scan`] next
    pub fn new(
        registry: DeviceRegistry,
        enumerator: Arc<dyn IPortEnumerator>,
        library: Arc<dyn IRideLibrary>,
        options: OrchestratorOptions,
    ) -> Self {
        let names = registry.type_names();
        let device_type = options
            .default_type
            .clone()
            .filter(|name| registry.contains(name))
            .or_else(|| names.first().cloned())
            .unwrap_or_default();

        Self {
            registry,
            enumerator,
            library,
            options,
            ports: Vec::new(),
            selected_port: None,
            device_type,
            control: CancelHandle::new(WorkflowState::Missing),
        }
    }

    // --- Accessors ---

    pub fn state(&self) -> WorkflowState {
        self.control.state()
    }

    /// Handle that can cancel the running operation from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.control.clone()
    }

    /// Requests cancellation; ignored unless a download or erase is running
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Ports found by the last scan
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn selected_port(&self) -> Option<&str> {
        self.selected_port.as_deref()
    }

    pub fn device_type_name(&self) -> &str {
        &self.device_type
    }

    /// Actions available to the user right now
    pub fn allowed_actions(&self) -> ActionSet {
        let supports_cleanup = self
            .registry
            .get_type(&self.device_type)
            .map(|h| h.device_type().supports_cleanup())
            .unwrap_or(false);
        self.state().allowed_actions(supports_cleanup)
    }

    fn ensure_not_active(&self, action: &'static str) -> Result<(), DownloadError> {
        let state = self.state();
        if state.is_active() {
            return Err(DownloadError::Busy { action, state });
        }
        Ok(())
    }

    /// Returns true if the current device type can use `port`
    fn accepts(&self, port: &Port) -> bool {
        self.registry
            .get_type(&self.device_type)
            .map(|h| h.accepts(port))
            .unwrap_or(false)
    }

    /// Keeps the selected port if the device type can use it, otherwise
    /// moves to the first port it can use
    fn refresh_selection(&mut self) {
        let keep = self
            .selected_port
            .as_deref()
            .and_then(|id| self.ports.iter().find(|p| p.id() == id))
            .is_some_and(|p| self.accepts(p));
        if !keep {
            self.selected_port = self
                .ports
                .iter()
                .find(|p| self.accepts(p))
                .map(|p| p.id().to_string());
            debug!(port = ?self.selected_port, device = %self.device_type, "Port selection refreshed");
        }
    }

    fn settle(&self) {
        let state = if self.ports.is_empty() {
            WorkflowState::Missing
        } else {
            WorkflowState::Idle
        };
        self.control.enter(state);
    }

    // --- Selection ---

    /// Text telling the user what to do next
    pub fn ready_instructions(&self) -> Result<String, DownloadError> {
        if self.ports.is_empty() {
            return Ok(NO_DEVICES_TEXT.to_string());
        }
        let handle = self.registry.get_type(&self.device_type)?;
        if self.selected_port.is_none() {
            return Ok(format!(
                "None of the attached ports can reach a {} device. Choose another \
                 device type or rescan.",
                self.device_type
            ));
        }
        Ok(handle.device_type().ready_instructions())
    }

    /// Chooses the device type used by the next download or erase
    pub fn set_device_type(&mut self, name: &str) -> Result<String, DownloadError> {
        self.ensure_not_active("change device type")?;
        self.registry.get_type(name)?;
        self.device_type = name.to_string();
        self.refresh_selection();
        self.settle();
        self.ready_instructions()
    }

    /// Chooses the port used by the next download or erase
    ///
    /// # Errors
    /// Returns `DownloadError::PortUnsupported` if the current device type
    /// cannot be reached through the port.
    pub fn set_port(&mut self, id: &str) -> Result<(), DownloadError> {
        self.ensure_not_active("change port")?;
        let port = self
            .ports
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| DownloadError::PortNotFound(id.to_string()))?;
        if !self.accepts(port) {
            return Err(DownloadError::PortUnsupported {
                port: id.to_string(),
                device_type: self.device_type.clone(),
            });
        }
        self.selected_port = Some(id.to_string());
        Ok(())
    }

    /// Probes for ports and refreshes the selection
    ///
    /// Ends in `Missing` when nothing is attached and `Idle` otherwise.
    pub async fn scan(
        &mut self,
        observer: &dyn IDownloadObserver,
    ) -> Result<PortScan, DownloadError> {
        self.ensure_not_active("rescan")?;

        let scan = self.enumerator.scan().await;
        info!(ports = scan.ports.len(), warning = scan.has_warning(), "Port scan finished");

        if scan.has_warning() {
            observer
                .report_status(&format!(
                    "Warning(s):\n\n{}\n\n{}",
                    scan.warning, DRIVER_HINT_TEXT
                ))
                .await;
        }

        self.ports = scan.ports.clone();
        if let Some(suggested) = self
            .registry
            .suggest_type(&self.ports, &self.options.chipset_hints)
        {
            debug!(device_type = %suggested, "Device type chosen from chipset");
            self.device_type = suggested;
        }
        self.refresh_selection();

        self.settle();
        observer.report_progress("").await;
        observer.report_status(&self.ready_instructions()?).await;
        Ok(scan)
    }

    fn current_port(&self) -> Result<Port, DownloadError> {
        let id = self
            .selected_port
            .as_deref()
            .ok_or(DownloadError::NoPortSelected)?;
        let port = self
            .ports
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| DownloadError::PortNotFound(id.to_string()))?;
        if !self.accepts(port) {
            return Err(DownloadError::PortUnsupported {
                port: id.to_string(),
                device_type: self.device_type.clone(),
            });
        }
        Ok(port.clone())
    }

    // --- Download ---

    /// Downloads the rides on the selected device into the library
    pub async fn download(
        &mut self,
        observer: &dyn IDownloadObserver,
    ) -> Result<DownloadSummary, DownloadError> {
        let state = self.state();
        if state != WorkflowState::Idle {
            return Err(DownloadError::Busy {
                action: "download",
                state,
            });
        }
        let port = self.current_port()?;
        let handle = self.registry.get_type(&self.device_type)?;

        let token = self.control.enter(WorkflowState::Downloading);
        observer.report_progress("").await;
        info!(port = %port.id(), device = %self.device_type, "Download started");

        let mut session = handle.new_device(&port);
        let result = self.run_download(&mut session, &token, observer).await;

        self.settle();
        result
    }

    async fn run_download(
        &self,
        session: &mut DeviceSession,
        token: &CancellationToken,
        observer: &dyn IDownloadObserver,
    ) -> Result<DownloadSummary, DownloadError> {
        if let Err(e) = session.preview(observer).await {
            let reason = e.to_string();
            observer.report_status(&format!("Preview failed: {reason}")).await;
            return Err(match e {
                SessionError::Preview(reason) => DownloadError::PreviewFailed(reason),
                other => DownloadError::Session(other),
            });
        }

        if !session.rides().is_empty() {
            if self.options.auto_select_all {
                session.select_all()?;
            } else {
                observer.select_rides(session.rides_mut()?).await;
            }
        }
        session.confirm_selection()?;

        let report = match session
            .download(&self.options.temp_dir, token, observer)
            .await
        {
            Ok(report) => report,
            Err(SessionError::Cancelled { completed }) => {
                discard_all(&completed).await;
                observer.report_status("Download cancelled by user.").await;
                observer.report_status("Download failed").await;
                return Err(DownloadError::Cancelled);
            }
            Err(SessionError::Transfer {
                reason, completed, ..
            }) => {
                discard_all(&completed).await;
                observer
                    .report_status(&format!("Download failed: {reason}"))
                    .await;
                return Err(DownloadError::TransferFailed(reason));
            }
            Err(other) => return Err(other.into()),
        };

        observer.report_progress("").await;

        let finalizer = RideFinalizer::new(self.library.as_ref())
            .with_overwrite_policy(self.options.overwrite_policy)
            .keep_failed_temp_files(self.options.keep_failed_temp_files);

        let mut summary = DownloadSummary {
            ride_failures: report.failures,
            ..DownloadSummary::default()
        };

        for file in &report.files {
            match finalizer.finalize(file, observer).await {
                FinalizeOutcome::Committed(name) => summary.committed.push(name),
                FinalizeOutcome::Skipped(name) => summary.skipped.push(name),
                FinalizeOutcome::Failed { file_name, .. } => {
                    summary.finalize_failures.push(file_name)
                }
            }
        }

        if summary.is_success() {
            observer
                .report_status("download completed successfully")
                .await;
        }

        info!(
            committed = summary.committed.len(),
            skipped = summary.skipped.len(),
            failures = summary.failures(),
            "Download finished"
        );
        Ok(summary)
    }

    // --- Erase ---

    /// Erases the rides stored on the selected device
    pub async fn erase(&mut self, observer: &dyn IDownloadObserver) -> Result<(), DownloadError> {
        let state = self.state();
        if state != WorkflowState::Idle {
            return Err(DownloadError::Busy {
                action: "erase",
                state,
            });
        }
        let port = self.current_port()?;
        let handle = self.registry.get_type(&self.device_type)?;

        let token = self.control.enter(WorkflowState::Cleaning);
        observer.report_progress("").await;

        let mut session = handle.new_device(&port);
        let result = match session.cleanup(&token, observer).await {
            Ok(()) => {
                observer.report_status("cleaned data").await;
                Ok(())
            }
            Err(SessionError::Cancelled { .. }) => {
                observer.report_status("Erase cancelled by user.").await;
                Err(DownloadError::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "Erase failed");
                observer.report_status(&e.to_string()).await;
                Err(DownloadError::CleanupFailed(e.to_string()))
            }
        };

        self.settle();
        result
    }
}

async fn discard_all(files: &[DownloadedFile]) {
    for file in files {
        discard_partial(file.temp_path()).await;
    }
}
