//! Integration test: DownloadOrchestrator → DeviceSession → RideFinalizer
//!
//! Drives the whole workflow against a scripted in-memory device, a fixed
//! port list, and a real library directory on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rideport_core::{
    config::{Config, ConfigBuilder},
    domain::{DeviceType, Port, PortScan, RideItem, SessionState, WorkflowState},
    ports::{
        IDeviceDriver, IDeviceFactory, IDownloadObserver, IPortEnumerator, IRideLibrary,
        OverwriteDecision, RideSink, TransferFault,
    },
    registry::DeviceRegistry,
    usecases::{
        CancelHandle, DownloadError, DownloadOrchestrator, OrchestratorOptions, SessionError,
    },
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted device
// ============================================================================

#[derive(Default)]
struct DeviceLog {
    opens: usize,
    closes: usize,
    erases: usize,
}

#[derive(Default)]
struct Script {
    rides: Vec<RideItem>,
    payloads: HashMap<String, Vec<u8>>,
    bad_rides: Vec<String>,
    open_fails: AtomicBool,
    list_fails: bool,
    link_drops_at: Option<String>,
    cancel_during: Option<String>,
    cancel_handle: Mutex<Option<CancelHandle>>,
    log: Mutex<DeviceLog>,
}

impl Script {
    fn with_ride(mut self, key: &str, hour: u32, payload: &[u8]) -> Self {
        self.rides
            .push(RideItem::new(key, at(hour), "fit").unwrap());
        self.payloads.insert(key.to_string(), payload.to_vec());
        self
    }

    fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

struct ScriptedDriver {
    script: Arc<Script>,
}

#[async_trait::async_trait]
impl IDeviceDriver for ScriptedDriver {
    async fn open(&mut self) -> anyhow::Result<()> {
        self.script.log.lock().unwrap().opens += 1;
        if self.script.open_fails.load(Ordering::SeqCst) {
            anyhow::bail!("no answer from device");
        }
        Ok(())
    }

    async fn list_rides(
        &mut self,
        _observer: &dyn IDownloadObserver,
    ) -> anyhow::Result<Vec<RideItem>> {
        if self.script.list_fails {
            anyhow::bail!("ride directory unreadable");
        }
        Ok(self.script.rides.clone())
    }

    async fn fetch_ride(
        &mut self,
        ride: &RideItem,
        sink: &mut RideSink,
        _observer: &dyn IDownloadObserver,
        _cancel: &CancellationToken,
    ) -> Result<u64, TransferFault> {
        if self.script.cancel_during.as_deref() == Some(ride.key()) {
            if let Some(handle) = self.script.cancel_handle.lock().unwrap().as_ref() {
                handle.cancel();
            }
        }
        if self.script.link_drops_at.as_deref() == Some(ride.key()) {
            return Err(TransferFault::Link("device stopped responding".into()));
        }
        if self.script.bad_rides.iter().any(|k| k == ride.key()) {
            sink.write_all(b"garbage").await.ok();
            return Err(TransferFault::Ride("checksum mismatch".into()));
        }
        let payload = &self.script.payloads[ride.key()];
        sink.write_all(payload)
            .await
            .map_err(|e| TransferFault::Link(e.to_string()))?;
        Ok(payload.len() as u64)
    }

    async fn erase(&mut self) -> anyhow::Result<()> {
        self.script.log.lock().unwrap().erases += 1;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.script.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct ScriptedFactory {
    device_type: DeviceType,
    script: Arc<Script>,
    required_hint: Option<&'static str>,
}

impl IDeviceFactory for ScriptedFactory {
    fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    fn accepts(&self, port: &Port) -> bool {
        self.required_hint
            .map_or(true, |hint| port.hints().iter().any(|h| h == hint))
    }

    fn connect(&self, _port: &Port) -> Box<dyn IDeviceDriver> {
        Box::new(ScriptedDriver {
            script: Arc::clone(&self.script),
        })
    }
}

// ============================================================================
// Ports, library and observer
// ============================================================================

struct FixedPorts(PortScan);

#[async_trait::async_trait]
impl IPortEnumerator for FixedPorts {
    async fn scan(&self) -> PortScan {
        self.0.clone()
    }
}

struct RecordingLibrary {
    root: PathBuf,
    added: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl IRideLibrary for RecordingLibrary {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn add_ride(&self, file_name: &str) -> anyhow::Result<()> {
        self.added.lock().unwrap().push(file_name.to_string());
        Ok(())
    }
}

struct RecordingObserver {
    statuses: Mutex<Vec<String>>,
    conflicts: Mutex<Vec<String>>,
    decision: OverwriteDecision,
    cancel: AtomicBool,
}

impl RecordingObserver {
    fn answering(decision: OverwriteDecision) -> Self {
        Self {
            statuses: Mutex::new(Vec::new()),
            conflicts: Mutex::new(Vec::new()),
            decision,
            cancel: AtomicBool::new(false),
        }
    }

    fn saw(&self, needle: &str) -> bool {
        self.statuses.lock().unwrap().iter().any(|s| s.contains(needle))
    }
}

#[async_trait::async_trait]
impl IDownloadObserver for RecordingObserver {
    async fn report_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    async fn report_progress(&self, _text: &str) {}

    async fn resolve_overwrite_conflict(&self, existing: &str) -> OverwriteDecision {
        self.conflicts.lock().unwrap().push(existing.to_string());
        self.decision
    }

    async fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Fixture
// ============================================================================

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

struct Fixture {
    _dir: TempDir,
    library: Arc<RecordingLibrary>,
    temp_dir: PathBuf,
    script: Arc<Script>,
    orchestrator: DownloadOrchestrator,
}

impl Fixture {
    fn new(script: Script, ports: PortScan, configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("library");
        let config: Config = configure(ConfigBuilder::new().library_root(root.clone())).build();
        let temp_dir = config.temp_dir();

        let script = Arc::new(script);
        let registry = DeviceRegistry::new(vec![
            Arc::new(ScriptedFactory {
                device_type: DeviceType::new("PowerTap")
                    .with_instructions("Turn unit on, press MODE until the display shows \"host\""),
                script: Arc::clone(&script),
                required_hint: None,
            }) as Arc<dyn IDeviceFactory>,
            Arc::new(ScriptedFactory {
                device_type: DeviceType::new("SRM").with_cleanup(),
                script: Arc::clone(&script),
                required_hint: None,
            }),
            Arc::new(ScriptedFactory {
                device_type: DeviceType::new("Mass Storage").with_cleanup(),
                script: Arc::clone(&script),
                required_hint: Some("mass-storage"),
            }),
        ])
        .unwrap();

        let library = Arc::new(RecordingLibrary {
            root,
            added: Mutex::new(Vec::new()),
        });
        let orchestrator = DownloadOrchestrator::new(
            registry,
            Arc::new(FixedPorts(ports)),
            Arc::clone(&library) as Arc<dyn IRideLibrary>,
            OrchestratorOptions::from_config(&config),
        );
        *script.cancel_handle.lock().unwrap() = Some(orchestrator.cancel_handle());

        Self {
            _dir: dir,
            library,
            temp_dir,
            script,
            orchestrator,
        }
    }

    fn library_file(&self, name: &str) -> PathBuf {
        self.library.root.join(name)
    }

    fn added(&self) -> Vec<String> {
        self.library.added.lock().unwrap().clone()
    }

    fn leftover_temp_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn one_port() -> PortScan {
    PortScan::new(vec![Port::new("/dev/ttyUSB0", "FT232R USB UART").unwrap()])
}

fn three_rides() -> Script {
    Script::default()
        .with_ride("r1", 8, b"ride one")
        .with_ride("r2", 9, b"ride two")
        .with_ride("r3", 10, b"ride three")
}

// ============================================================================
// Scanning
// ============================================================================

#[tokio::test]
async fn test_scan_without_ports_enters_missing() {
    let mut fx = Fixture::new(three_rides(), PortScan::default(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);

    fx.orchestrator.scan(&observer).await.unwrap();

    assert_eq!(fx.orchestrator.state(), WorkflowState::Missing);
    let actions = fx.orchestrator.allowed_actions();
    assert!(!actions.download);
    assert!(!actions.erase);
    assert!(actions.rescan);
    assert!(observer.saw("No devices found"));

    let err = fx.orchestrator.download(&observer).await.unwrap_err();
    assert!(matches!(err, DownloadError::Busy { .. }));
    assert_eq!(fx.script.opens(), 0);
}

#[tokio::test]
async fn test_scan_reports_driver_warning() {
    let scan = one_port().with_warning("no USB serial driver is loaded");
    let mut fx = Fixture::new(three_rides(), scan, |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);

    fx.orchestrator.scan(&observer).await.unwrap();

    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert!(observer.saw("Warning(s):\n\nno USB serial driver is loaded"));
    assert!(observer.saw("FTDI or PL2303"));
    assert!(observer.saw("press MODE until the display shows \"host\""));
}

#[tokio::test]
async fn test_scan_picks_device_type_from_chipset() {
    let scan = PortScan::new(vec![
        Port::new("/dev/ttyUSB0", "Prolific PL2303").unwrap(),
    ]);
    let mut fx = Fixture::new(three_rides(), scan, |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    assert_eq!(fx.orchestrator.device_type_name(), "PowerTap");

    fx.orchestrator.scan(&observer).await.unwrap();

    assert_eq!(fx.orchestrator.device_type_name(), "SRM");
    assert!(fx.orchestrator.allowed_actions().erase);
    assert!(observer.saw("Click Download to begin downloading."));
}

#[tokio::test]
async fn test_port_selection_follows_device_type() {
    let scan = PortScan::new(vec![
        Port::new("/dev/ttyUSB0", "FT232R USB UART").unwrap(),
        Port::new("/media/EDGE", "EDGE").unwrap().with_hint("mass-storage"),
    ]);
    let mut fx = Fixture::new(three_rides(), scan, |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();
    assert_eq!(fx.orchestrator.selected_port(), Some("/dev/ttyUSB0"));

    fx.orchestrator.set_device_type("Mass Storage").unwrap();
    assert_eq!(fx.orchestrator.selected_port(), Some("/media/EDGE"));

    let err = fx.orchestrator.set_port("/dev/ttyUSB0").unwrap_err();
    assert!(matches!(err, DownloadError::PortUnsupported { .. }));
    assert_eq!(fx.orchestrator.selected_port(), Some("/media/EDGE"));

    let summary = fx.orchestrator.download(&observer).await.unwrap();
    assert_eq!(summary.committed.len(), 3);
}

#[tokio::test]
async fn test_no_usable_port_for_device_type() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| {
        b.devices_default_type("Mass Storage")
    });
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);

    fx.orchestrator.scan(&observer).await.unwrap();

    assert_eq!(fx.orchestrator.selected_port(), None);
    assert!(observer.saw("None of the attached ports can reach a Mass Storage device"));
    let err = fx.orchestrator.download(&observer).await.unwrap_err();
    assert!(matches!(err, DownloadError::NoPortSelected));
    assert_eq!(fx.script.opens(), 0);
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_all_rides() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let summary = fx.orchestrator.download(&observer).await.unwrap();

    assert_eq!(
        summary.committed,
        vec![
            "2024_03_01_08_00_00.fit",
            "2024_03_01_09_00_00.fit",
            "2024_03_01_10_00_00.fit"
        ]
    );
    assert_eq!(fx.added(), summary.committed);
    assert_eq!(
        std::fs::read(fx.library_file("2024_03_01_09_00_00.fit")).unwrap(),
        b"ride two"
    );
    assert!(observer.saw("download completed successfully"));
    assert!(fx.leftover_temp_files().is_empty());
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert_eq!(fx.script.opens(), fx.script.closes());
}

#[tokio::test]
async fn test_failing_ride_does_not_stop_the_rest() {
    let mut script = three_rides();
    script.bad_rides.push("r2".into());
    let mut fx = Fixture::new(script, one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let summary = fx.orchestrator.download(&observer).await.unwrap();

    assert_eq!(
        summary.committed,
        vec!["2024_03_01_08_00_00.fit", "2024_03_01_10_00_00.fit"]
    );
    assert_eq!(summary.ride_failures.len(), 1);
    assert_eq!(summary.ride_failures[0].ride.key(), "r2");
    assert_eq!(summary.failures(), 1);
    assert_eq!(fx.added().len(), 2);
    assert!(!fx.library_file("2024_03_01_09_00_00.fit").exists());
    assert!(observer.saw("checksum mismatch"));
    assert!(!observer.saw("download completed successfully"));
    assert!(fx.leftover_temp_files().is_empty());
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn test_link_failure_aborts_and_discards() {
    let mut script = three_rides();
    script.link_drops_at = Some("r2".into());
    let mut fx = Fixture::new(script, one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let err = fx.orchestrator.download(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::TransferFailed(ref r) if r == "device stopped responding"));
    assert!(fx.added().is_empty());
    assert!(fx.leftover_temp_files().is_empty());
    assert!(observer.saw("Download failed: device stopped responding"));
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert_eq!(fx.script.opens(), fx.script.closes());
}

#[tokio::test]
async fn test_skip_keeps_existing_file() {
    let mut fx = Fixture::new(
        Script::default().with_ride("r1", 8, b"new data"),
        one_port(),
        |b| b,
    );
    std::fs::create_dir_all(&fx.library.root).unwrap();
    std::fs::write(fx.library_file("2024_03_01_08_00_00.fit"), b"old data").unwrap();
    let observer = RecordingObserver::answering(OverwriteDecision::Skip);
    fx.orchestrator.scan(&observer).await.unwrap();

    let summary = fx.orchestrator.download(&observer).await.unwrap();

    assert!(summary.committed.is_empty());
    assert_eq!(summary.skipped, vec!["2024_03_01_08_00_00.fit"]);
    assert!(summary.is_success());
    assert!(fx.added().is_empty());
    assert_eq!(
        std::fs::read(fx.library_file("2024_03_01_08_00_00.fit")).unwrap(),
        b"old data"
    );
    let conflicts = observer.conflicts.lock().unwrap().clone();
    assert_eq!(
        conflicts,
        vec!["The ride starting at Fri Mar 1 08:00:00 2024 appears to have already been downloaded."]
    );
    assert!(observer.saw("skipped file"));
    assert!(fx.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_overwrite_twice_is_idempotent() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| {
        b.conflicts_default_action("overwrite")
    });
    let observer = RecordingObserver::answering(OverwriteDecision::Skip);
    fx.orchestrator.scan(&observer).await.unwrap();

    fx.orchestrator.download(&observer).await.unwrap();
    let second = fx.orchestrator.download(&observer).await.unwrap();

    assert_eq!(second.committed.len(), 3);
    assert!(observer.conflicts.lock().unwrap().is_empty());
    let mut names: Vec<String> = std::fs::read_dir(&fx.library.root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    assert_eq!(names.len(), 3);
    assert_eq!(
        std::fs::read(fx.library_file("2024_03_01_10_00_00.fit")).unwrap(),
        b"ride three"
    );
    assert!(fx.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_manual_selection_uses_observer() {
    struct PickFirst(RecordingObserver);

    #[async_trait::async_trait]
    impl IDownloadObserver for PickFirst {
        async fn report_status(&self, text: &str) {
            self.0.report_status(text).await
        }
        async fn report_progress(&self, _text: &str) {}
        async fn resolve_overwrite_conflict(&self, existing: &str) -> OverwriteDecision {
            self.0.resolve_overwrite_conflict(existing).await
        }
        async fn select_rides(&self, rides: &mut [RideItem]) {
            for (i, ride) in rides.iter_mut().enumerate() {
                ride.wanted = i == 0;
            }
        }
    }

    let mut fx = Fixture::new(three_rides(), one_port(), |b| b.download_auto_select_all(false));
    let observer = PickFirst(RecordingObserver::answering(OverwriteDecision::Overwrite));
    fx.orchestrator.scan(&observer).await.unwrap();

    let summary = fx.orchestrator.download(&observer).await.unwrap();

    assert_eq!(summary.committed, vec!["2024_03_01_08_00_00.fit"]);
}

#[tokio::test]
async fn test_open_failure_is_a_preview_failure() {
    let script = three_rides();
    script.open_fails.store(true, Ordering::SeqCst);
    let mut fx = Fixture::new(script, one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let err = fx.orchestrator.download(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::PreviewFailed(ref r) if r == "no answer from device"));
    assert!(observer.saw("Preview failed: no answer from device"));
    assert_eq!(fx.script.opens(), 1);
    assert_eq!(fx.script.opens(), fx.script.closes());
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert!(fx.added().is_empty());
}

#[tokio::test]
async fn test_listing_failure_releases_transport() {
    let mut script = three_rides();
    script.list_fails = true;
    let mut fx = Fixture::new(script, one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let err = fx.orchestrator.download(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::PreviewFailed(ref r) if r == "ride directory unreadable"));
    assert_eq!(fx.script.opens(), 1);
    assert_eq!(fx.script.closes(), 1);
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert!(fx.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_session_preview_can_be_retried() {
    let script = Arc::new(three_rides());
    script.open_fails.store(true, Ordering::SeqCst);
    let registry = DeviceRegistry::new(vec![Arc::new(ScriptedFactory {
        device_type: DeviceType::new("PowerTap"),
        script: Arc::clone(&script),
        required_hint: None,
    }) as Arc<dyn IDeviceFactory>])
    .unwrap();
    let port = Port::new("/dev/ttyUSB0", "").unwrap();
    let mut session = registry.get_type("PowerTap").unwrap().new_device(&port);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);

    let err = session.preview(&observer).await.unwrap_err();
    assert!(matches!(err, SessionError::Preview(_)));
    assert_eq!(session.state(), SessionState::Created);
    assert!(session.rides().is_empty());

    script.open_fails.store(false, Ordering::SeqCst);
    let found = session.preview(&observer).await.unwrap().len();

    assert_eq!(found, 3);
    assert_eq!(session.state(), SessionState::Previewed);
    assert_eq!(script.opens(), 2);
    assert_eq!(script.closes(), 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_before_checkpoint_releases_transport() {
    let mut script = three_rides();
    script.cancel_during = Some("r1".into());
    let mut fx = Fixture::new(script, one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    let err = fx.orchestrator.download(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled));
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
    assert_eq!(fx.script.opens(), 2);
    assert_eq!(fx.script.opens(), fx.script.closes());
    assert!(fx.added().is_empty());
    assert!(fx.leftover_temp_files().is_empty());
    assert!(observer.saw("Download cancelled by user."));
}

#[tokio::test]
async fn test_observer_cancel_stops_before_opening() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();
    observer.cancel.store(true, Ordering::SeqCst);

    let err = fx.orchestrator.download(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled));
    // Only the preview opened the transport.
    assert_eq!(fx.script.opens(), 1);
    assert_eq!(fx.script.closes(), 1);
}

#[tokio::test]
async fn test_cancel_ignored_while_idle() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();

    assert!(!fx.orchestrator.cancel());

    let summary = fx.orchestrator.download(&observer).await.unwrap();
    assert_eq!(summary.committed.len(), 3);
}

// ============================================================================
// Erase
// ============================================================================

#[tokio::test]
async fn test_erase_supported_device() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();
    fx.orchestrator.set_device_type("SRM").unwrap();

    fx.orchestrator.erase(&observer).await.unwrap();

    assert_eq!(fx.script.log.lock().unwrap().erases, 1);
    assert!(observer.saw("cleaned data"));
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn test_erase_unsupported_device() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();
    assert!(!fx.orchestrator.allowed_actions().erase);

    let err = fx.orchestrator.erase(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::CleanupFailed(_)));
    assert_eq!(fx.script.opens(), 0);
}

#[tokio::test]
async fn test_unknown_device_type_rejected() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let err = fx.orchestrator.set_device_type("Kettler").unwrap_err();
    assert!(matches!(err, DownloadError::Registry(_)));
    assert_eq!(fx.orchestrator.device_type_name(), "PowerTap");
}

#[tokio::test]
async fn test_erase_cancelled_before_opening() {
    let mut fx = Fixture::new(three_rides(), one_port(), |b| b);
    let observer = RecordingObserver::answering(OverwriteDecision::Overwrite);
    fx.orchestrator.scan(&observer).await.unwrap();
    fx.orchestrator.set_device_type("SRM").unwrap();
    observer.cancel.store(true, Ordering::SeqCst);

    let err = fx.orchestrator.erase(&observer).await.unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled));
    assert!(observer.saw("Erase cancelled by user."));
    assert_eq!(fx.script.opens(), 0);
    assert_eq!(fx.script.log.lock().unwrap().erases, 0);
    assert_eq!(fx.orchestrator.state(), WorkflowState::Idle);
}
