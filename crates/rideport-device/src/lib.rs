//! RidePort Device - adapters for ports and devices
//!
//! Implements the core's driven ports against the local machine:
//!
//! - [`serial::SysfsPortEnumerator`] lists USB serial adapters from `/dev`
//!   and `/sys/class/tty`
//! - [`mount::MountPointEnumerator`] offers mounted device directories as ports
//! - [`CompositePortEnumerator`] merges several enumerators into one scan
//! - [`mass_storage`] drives devices that expose their rides as plain files
//! - [`catalog`] assembles the built-in registry and enumerators from config

pub mod catalog;
pub mod mass_storage;
pub mod mount;
pub mod serial;

use std::sync::Arc;

use rideport_core::{domain::PortScan, ports::IPortEnumerator};

pub use catalog::{builtin_registry, enumerator_from_config};
pub use mass_storage::{MassStorageDriver, MassStorageFactory};
pub use mount::MountPointEnumerator;
pub use serial::SysfsPortEnumerator;

/// Runs several enumerators in order and merges their results
pub struct CompositePortEnumerator {
    sources: Vec<Arc<dyn IPortEnumerator>>,
}

impl CompositePortEnumerator {
    pub fn new(sources: Vec<Arc<dyn IPortEnumerator>>) -> Self {
        Self { sources }
    }
}

#[async_trait::async_trait]
impl IPortEnumerator for CompositePortEnumerator {
    async fn scan(&self) -> PortScan {
        let mut merged = PortScan::default();
        for source in &self.sources {
            merged.merge(source.scan().await);
        }
        merged
    }
}
