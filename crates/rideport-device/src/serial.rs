//! Serial port enumerator backed by `/dev` and sysfs
//!
//! Device nodes are found by globbing (`/dev/ttyUSB*`, `/dev/ttyACM*` by
//! default). For each node the kernel driver and the USB product string are
//! read from `/sys/class/tty/<name>/device` and attached to the port as
//! chipset hints, so the registry can recognise a PL2303 or FTDI adapter.
//!
//! ## Design Decisions
//!
//! - **No opening**: nodes are only listed, never opened.
//! - **Blocking I/O off the runtime**: globbing and sysfs reads run inside
//!   `spawn_blocking`.
//! - **Driver warning**: when `/sys/bus/usb-serial/drivers` lists no driver
//!   the scan carries a warning even if ports were found.

use std::path::{Path, PathBuf};

use rideport_core::domain::{Port, PortScan};
use tracing::{debug, instrument, warn};

/// Default glob patterns probed for USB serial adapters
pub const DEFAULT_SERIAL_GLOBS: &[&str] = &["/dev/ttyUSB*", "/dev/ttyACM*"];

/// Kernel driver names and the chipset they belong to
const KNOWN_DRIVERS: &[(&str, &str)] = &[
    ("pl2303", "PL2303"),
    ("ftdi_sio", "FTDI"),
    ("cdc_acm", "CDC ACM"),
    ("cp210x", "CP210x"),
    ("ch341", "CH341"),
];

/// Lists USB serial adapters
#[derive(Debug, Clone)]
pub struct SysfsPortEnumerator {
    globs: Vec<String>,
    sysfs_root: PathBuf,
}

impl SysfsPortEnumerator {
    /// Creates an enumerator probing `globs` against the live sysfs
    pub fn new(globs: Vec<String>) -> Self {
        Self {
            globs,
            sysfs_root: PathBuf::from("/sys"),
        }
    }

    /// Reads driver details from `root` instead of `/sys`
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    fn scan_blocking(&self) -> PortScan {
        let mut warnings = Vec::new();
        let mut nodes: Vec<PathBuf> = Vec::new();

        for pattern in &self.globs {
            match glob::glob(pattern) {
                Ok(paths) => nodes.extend(paths.filter_map(Result::ok)),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Invalid serial glob");
                    warnings.push(format!("Ignoring invalid port pattern {pattern}: {e}"));
                }
            }
        }
        nodes.sort();
        nodes.dedup();

        let ports: Vec<Port> = nodes
            .iter()
            .filter_map(|node| self.describe(node))
            .collect();

        if !self.usb_serial_driver_loaded() {
            warnings.push(
                "No USB serial driver is loaded (looked for pl2303 and ftdi_sio).".to_string(),
            );
        }

        let scan = PortScan::new(ports);
        if warnings.is_empty() {
            scan
        } else {
            scan.with_warning(warnings.join("\n"))
        }
    }

    /// Builds a port for one device node
    fn describe(&self, node: &Path) -> Option<Port> {
        let id = node.to_str()?;
        let tty = node.file_name()?.to_str()?;
        let device_dir = self.sysfs_root.join("class/tty").join(tty).join("device");

        let driver = driver_name(&device_dir.join("driver"));
        let product = read_trimmed(&device_dir.join("product"))
            .or_else(|| read_trimmed(&device_dir.join("../product")));

        let chipset = driver.as_deref().map(chipset_for_driver);
        let name = match (&product, &chipset) {
            (Some(product), _) => product.clone(),
            (None, Some(chipset)) => format!("{chipset} serial adapter"),
            (None, None) => "serial port".to_string(),
        };

        let mut port = Port::new(id, name).ok()?;
        if let Some(chipset) = chipset {
            port = port.with_hint(chipset);
        }
        if let Some(driver) = driver {
            port = port.with_hint(driver);
        }
        debug!(port = %port, hints = ?port.hints(), "Serial port found");
        Some(port)
    }

    fn usb_serial_driver_loaded(&self) -> bool {
        let drivers = self.sysfs_root.join("bus/usb-serial/drivers");
        match std::fs::read_dir(&drivers) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }
}

impl Default for SysfsPortEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_SERIAL_GLOBS.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait::async_trait]
impl rideport_core::ports::IPortEnumerator for SysfsPortEnumerator {
    #[instrument(skip(self), fields(globs = ?self.globs))]
    async fn scan(&self) -> PortScan {
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.scan_blocking()).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(error = %e, "Serial scan task failed");
                PortScan::default().with_warning(format!("Serial port scan failed: {e}"))
            }
        }
    }
}

/// Driver name from the `driver` symlink in a sysfs device directory
fn driver_name(link: &Path) -> Option<String> {
    let target = std::fs::canonicalize(link).ok()?;
    target.file_name()?.to_str().map(str::to_string)
}

fn chipset_for_driver(driver: &str) -> String {
    KNOWN_DRIVERS
        .iter()
        .find(|(name, _)| *name == driver)
        .map(|(_, chipset)| chipset.to_string())
        .unwrap_or_else(|| driver.to_string())
}

fn read_trimmed(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chipset_for_driver() {
        assert_eq!(chipset_for_driver("pl2303"), "PL2303");
        assert_eq!(chipset_for_driver("ftdi_sio"), "FTDI");
        assert_eq!(chipset_for_driver("mystery"), "mystery");
    }

    #[test]
    fn test_read_trimmed_skips_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(read_trimmed(&path), None);
        std::fs::write(&path, "USB-Serial Controller\n").unwrap();
        assert_eq!(read_trimmed(&path).as_deref(), Some("USB-Serial Controller"));
    }
}
