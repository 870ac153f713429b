//! Device-type registry
//!
//! Catalog of supported device types keyed by name. The registry is built
//! once at startup from a list of [`IDeviceFactory`] trait objects and is
//! read-only afterwards.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    config::ChipsetHint,
    domain::{device::DeviceType, port::Port},
    ports::device_driver::IDeviceFactory,
    usecases::device_session::DeviceSession,
};

/// Errors raised while building or querying the registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The requested device type is not in the catalog
    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    /// A registry must list at least one device type
    #[error("device registry is empty")]
    Empty,

    /// Two factories registered the same device-type name
    #[error("device type registered twice: {0}")]
    Duplicate(String),
}

/// Handle to one catalog entry
#[derive(Clone)]
pub struct DeviceTypeHandle {
    factory: Arc<dyn IDeviceFactory>,
}

impl DeviceTypeHandle {
    /// The device type's name and capabilities
    pub fn device_type(&self) -> &DeviceType {
        self.factory.device_type()
    }

    /// Returns true if this device type can be reached through `port`
    pub fn accepts(&self, port: &Port) -> bool {
        self.factory.accepts(port)
    }

    /// Binds `port` to this device type
    ///
    /// The transport is not opened until the session is previewed or cleaned.
    pub fn new_device(&self, port: &Port) -> DeviceSession {
        let driver = self.factory.connect(port);
        DeviceSession::new(port.clone(), self.device_type().clone(), driver)
    }
}

impl std::fmt::Debug for DeviceTypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTypeHandle")
            .field("device_type", self.device_type())
            .finish()
    }
}

/// Catalog of supported device types
#[derive(Clone)]
pub struct DeviceRegistry {
    factories: Vec<Arc<dyn IDeviceFactory>>,
}

impl DeviceRegistry {
    /// Builds a registry preserving the order of `factories`
    ///
    /// # Errors
    /// Returns `RegistryError::Empty` if no factory is given and
    /// `RegistryError::Duplicate` if two factories share a name.
    pub fn new(factories: Vec<Arc<dyn IDeviceFactory>>) -> Result<Self, RegistryError> {
        if factories.is_empty() {
            return Err(RegistryError::Empty);
        }

        for (i, factory) in factories.iter().enumerate() {
            let name = factory.device_type().name();
            if factories[..i]
                .iter()
                .any(|f| f.device_type().name() == name)
            {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
        }

        debug!(types = factories.len(), "Device registry initialized");
        Ok(Self { factories })
    }

    /// Names of all registered device types, in registration order
    pub fn type_names(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|f| f.device_type().name().to_string())
            .collect()
    }

    /// Looks up a device type by name
    pub fn get_type(&self, name: &str) -> Result<DeviceTypeHandle, RegistryError> {
        self.factories
            .iter()
            .find(|f| f.device_type().name() == name)
            .map(|f| DeviceTypeHandle {
                factory: Arc::clone(f),
            })
            .ok_or_else(|| RegistryError::UnknownDeviceType(name.to_string()))
    }

    /// Returns true if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get_type(name).is_ok()
    }

    /// Picks a device type from the chipset of the first listed port
    ///
    /// Only the first port is inspected. The first hint whose chipset appears
    /// on that port and whose device type is registered wins.
    pub fn suggest_type(&self, ports: &[Port], hints: &[ChipsetHint]) -> Option<String> {
        let first = ports.first()?;
        hints
            .iter()
            .find(|hint| first.mentions(&hint.chipset) && self.contains(&hint.device_type))
            .map(|hint| {
                trace!(
                    port = %first.id(),
                    chipset = %hint.chipset,
                    device_type = %hint.device_type,
                    "Chipset hint matched"
                );
                hint.device_type.clone()
            })
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
