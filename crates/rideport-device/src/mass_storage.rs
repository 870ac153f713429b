//! Mass-storage device driver
//!
//! Head units that mount as USB storage expose each ride as a plain file.
//! The port id is the mount directory, and only ports carrying the
//! mount-point hint are accepted. Rides are the files below that directory with a
//! known ride extension; a ride's start time is the file's modification time
//! and its key is the path relative to the mount directory.
//!
//! ## Design Decisions
//!
//! - **Chunked copy**: rides are streamed in fixed-size chunks so progress
//!   can be reported and cancellation is checked between chunks.
//! - **Fault split**: an unreadable source file is a ride fault; a failing
//!   sink or a vanished mount is a link fault.
//! - **Erase** removes only the files `list_rides` would report.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDateTime};
use rideport_core::{
    domain::{DeviceType, Port, RideItem},
    ports::{IDeviceDriver, IDeviceFactory, IDownloadObserver, RideSink, TransferFault},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::mount::MASS_STORAGE_HINT;

/// Name under which the driver is registered
pub const DEVICE_TYPE_NAME: &str = "Mass Storage";

/// File extensions recognised as rides
pub const RIDE_EXTENSIONS: &[&str] = &["fit", "tcx", "gpx", "pwx", "srm", "csv"];

const CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// Factory
// ============================================================================

/// Catalog entry for mass-storage devices
#[derive(Debug, Clone)]
pub struct MassStorageFactory {
    device_type: DeviceType,
}

impl MassStorageFactory {
    pub fn new() -> Self {
        Self {
            device_type: DeviceType::new(DEVICE_TYPE_NAME)
                .with_cleanup()
                .with_instructions("Make sure the device's storage is mounted"),
        }
    }
}

impl Default for MassStorageFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl IDeviceFactory for MassStorageFactory {
    fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    fn accepts(&self, port: &Port) -> bool {
        port.hints().iter().any(|h| h == MASS_STORAGE_HINT)
    }

    fn connect(&self, port: &Port) -> Box<dyn IDeviceDriver> {
        Box::new(MassStorageDriver::new(PathBuf::from(port.id())))
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Reads rides from a mounted device directory
#[derive(Debug)]
pub struct MassStorageDriver {
    root: PathBuf,
    opened: bool,
}

impl MassStorageDriver {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            opened: false,
        }
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        if !self.opened {
            bail!("device at {} is not open", self.root.display());
        }
        Ok(())
    }

    /// Paths of every ride file below the mount directory
    async fn ride_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("cannot read {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if is_hidden(&path) {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && ride_extension(&path).is_some() {
                    found.push(path);
                }
            }
        }
        Ok(found)
    }

    fn ride_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait::async_trait]
impl IDeviceDriver for MassStorageDriver {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn open(&mut self) -> anyhow::Result<()> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("device not mounted at {}", self.root.display()))?;
        if !metadata.is_dir() {
            bail!("{} is not a directory", self.root.display());
        }
        self.opened = true;
        debug!("Mass-storage device opened");
        Ok(())
    }

    async fn list_rides(
        &mut self,
        observer: &dyn IDownloadObserver,
    ) -> anyhow::Result<Vec<RideItem>> {
        self.ensure_open()?;

        let mut rides = Vec::new();
        for path in self.ride_files().await? {
            let Some(extension) = ride_extension(&path) else {
                continue;
            };
            let metadata = tokio::fs::metadata(&path).await?;
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let ride = RideItem::new(self.ride_key(&path), local_time(modified), extension)?
                .with_size(metadata.len());
            rides.push(ride);
        }
        rides.sort_by(|a, b| {
            a.start_time()
                .cmp(&b.start_time())
                .then_with(|| a.key().cmp(b.key()))
        });

        observer
            .report_status(&format!("found {} ride(s) on the device", rides.len()))
            .await;
        info!(rides = rides.len(), root = %self.root.display(), "Rides listed");
        Ok(rides)
    }

    async fn fetch_ride(
        &mut self,
        ride: &RideItem,
        sink: &mut RideSink,
        observer: &dyn IDownloadObserver,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferFault> {
        self.ensure_open()
            .map_err(|e| TransferFault::Link(e.to_string()))?;

        let path = self.root.join(ride.key());
        let mut source = tokio::fs::File::open(&path)
            .await
            .map_err(|e| TransferFault::Ride(format!("cannot open {}: {e}", path.display())))?;
        let total = match ride.size_bytes() {
            Some(size) => size,
            None => source.metadata().await.map(|m| m.len()).unwrap_or(0),
        };

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut copied: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(TransferFault::Cancelled);
            }
            let read = source
                .read(&mut buffer)
                .await
                .map_err(|e| TransferFault::Ride(format!("read failed: {e}")))?;
            if read == 0 {
                break;
            }
            sink.write_all(&buffer[..read])
                .await
                .map_err(|e| TransferFault::Link(format!("write failed: {e}")))?;
            copied += read as u64;
            observer
                .report_progress(&progress_text(copied, total))
                .await;
        }

        debug!(ride = %ride.key(), bytes = copied, "Ride copied");
        Ok(copied)
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn erase(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        let files = self.ride_files().await?;
        for path in &files {
            tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("cannot remove {}", path.display()))?;
        }
        info!(removed = files.len(), "Device storage erased");
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.opened = false;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Lower-cased ride extension of `path`, if it is a known one
fn ride_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    RIDE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn local_time(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

fn progress_text(copied: u64, total: u64) -> String {
    if total == 0 {
        format!("{} KB", copied / 1024)
    } else {
        let percent = (copied.min(total) * 100) / total;
        format!("{} of {} KB ({percent}%)", copied / 1024, total / 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_extension_is_case_insensitive() {
        assert_eq!(ride_extension(Path::new("/m/A.FIT")).as_deref(), Some("fit"));
        assert_eq!(ride_extension(Path::new("/m/b.tcx")).as_deref(), Some("tcx"));
        assert_eq!(ride_extension(Path::new("/m/readme.txt")), None);
        assert_eq!(ride_extension(Path::new("/m/noext")), None);
    }

    #[test]
    fn test_progress_text() {
        assert_eq!(progress_text(512 * 1024, 1024 * 1024), "512 of 1024 KB (50%)");
        assert_eq!(progress_text(2048, 0), "2 KB");
    }

    #[test]
    fn test_ride_key_uses_forward_slashes() {
        let driver = MassStorageDriver::new(PathBuf::from("/media/EDGE"));
        let key = driver.ride_key(Path::new("/media/EDGE/Garmin/Activity/a.fit"));
        assert_eq!(key, "Garmin/Activity/a.fit");
    }

    #[test]
    fn test_factory_describes_cleanup_capable_type() {
        let factory = MassStorageFactory::new();
        assert_eq!(factory.device_type().name(), DEVICE_TYPE_NAME);
        assert!(factory.device_type().supports_cleanup());
    }

    #[test]
    fn test_factory_accepts_only_mount_points() {
        let factory = MassStorageFactory::new();
        let mount = Port::new("/media/EDGE", "EDGE")
            .unwrap()
            .with_hint(MASS_STORAGE_HINT);
        let serial = Port::new("/dev/ttyUSB0", "FT232R").unwrap().with_hint("FTDI");
        assert!(factory.accepts(&mount));
        assert!(!factory.accepts(&serial));
    }
}
