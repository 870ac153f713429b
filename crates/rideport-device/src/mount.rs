//! Mount point enumerator
//!
//! Offers each configured directory that currently exists as a port, so a
//! head unit mounted as USB storage can be picked like any serial adapter.

use std::path::PathBuf;

use rideport_core::{
    domain::{Port, PortScan},
    ports::IPortEnumerator,
};
use tracing::{debug, trace};

/// Capability hint carried by every mount-point port
pub const MASS_STORAGE_HINT: &str = "mass-storage";

/// Lists configured device directories that are currently mounted
#[derive(Debug, Clone, Default)]
pub struct MountPointEnumerator {
    mount_points: Vec<PathBuf>,
}

impl MountPointEnumerator {
    pub fn new(mount_points: Vec<PathBuf>) -> Self {
        Self { mount_points }
    }
}

#[async_trait::async_trait]
impl IPortEnumerator for MountPointEnumerator {
    async fn scan(&self) -> PortScan {
        let mut ports = Vec::new();
        for dir in &self.mount_points {
            let is_dir = tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                trace!(path = %dir.display(), "Mount point absent");
                continue;
            }

            let label = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string());
            if let Ok(port) = Port::new(dir.display().to_string(), label) {
                ports.push(port.with_hint(MASS_STORAGE_HINT));
            }
        }
        debug!(ports = ports.len(), "Mount points scanned");
        PortScan::new(ports)
    }
}
