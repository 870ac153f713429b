//! Built-in device catalog and port enumerators

use std::sync::Arc;

use rideport_core::{
    config::DevicesConfig,
    ports::{IDeviceFactory, IPortEnumerator},
    registry::{DeviceRegistry, RegistryError},
};

use crate::{
    mass_storage::MassStorageFactory, mount::MountPointEnumerator,
    serial::SysfsPortEnumerator, CompositePortEnumerator,
};

/// Registry of every device type this build can drive
pub fn builtin_registry() -> Result<DeviceRegistry, RegistryError> {
    let factories: Vec<Arc<dyn IDeviceFactory>> = vec![Arc::new(MassStorageFactory::new())];
    DeviceRegistry::new(factories)
}

/// Port enumerator covering the configured serial globs and mount points
///
/// Serial ports are listed first, so chipset hints apply to them. Each
/// device type then picks the first port it accepts.
pub fn enumerator_from_config(devices: &DevicesConfig) -> Arc<dyn IPortEnumerator> {
    let sources: Vec<Arc<dyn IPortEnumerator>> = vec![
        Arc::new(SysfsPortEnumerator::new(devices.serial_globs.clone())),
        Arc::new(MountPointEnumerator::new(devices.mount_points.clone())),
    ];
    Arc::new(CompositePortEnumerator::new(sources))
}
