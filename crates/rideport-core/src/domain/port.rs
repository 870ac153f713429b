//! Communication ports
//!
//! A [`Port`] is an addressable endpoint a device may be attached to, such as
//! `/dev/ttyUSB0` or the mount point of a mass-storage device. Ports are
//! enumerated fresh on every scan and never mutated afterwards.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// An attached communication port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Stable identifier used to select the port (device node or path)
    id: String,
    /// Human-readable name, usually the product or driver description
    name: String,
    /// Capability hints such as chipset or driver names
    hints: Vec<String>,
}

impl Port {
    /// Creates a new port
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPortId` if `id` is empty or whitespace.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidPortId(id));
        }
        Ok(Self {
            id,
            name: name.into(),
            hints: Vec::new(),
        })
    }

    /// Adds a capability hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Returns the port identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the capability hints
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Returns true if the display name or any hint contains `chipset`
    pub fn mentions(&self, chipset: &str) -> bool {
        self.name.contains(chipset) || self.hints.iter().any(|h| h.contains(chipset))
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.name)
        }
    }
}

/// Result of probing the transport layer for ports
///
/// An empty port list is a valid outcome, not an error. `warning` carries
/// advisory text when driver prerequisites look unmet and is empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScan {
    pub ports: Vec<Port>,
    pub warning: String,
}

impl PortScan {
    /// Creates a scan result with no warning
    pub fn new(ports: Vec<Port>) -> Self {
        Self {
            ports,
            warning: String::new(),
        }
    }

    /// Sets the warning text
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = warning.into();
        self
    }

    /// Returns true if a warning was produced
    pub fn has_warning(&self) -> bool {
        !self.warning.is_empty()
    }

    /// Appends another scan, joining warnings with a newline
    pub fn merge(&mut self, other: PortScan) {
        let PortScan { ports, warning } = other;
        self.ports.extend(ports);
        if !warning.is_empty() {
            if self.has_warning() {
                self.warning.push('\n');
            }
            self.warning.push_str(&warning);
        }
    }
}
