//! Device types
//!
//! A [`DeviceType`] is an entry in the device catalog. It names the kind of
//! unit (e.g. "SRM", "Mass Storage") and carries the capability flags the
//! workflow needs before any transport is opened.

use serde::{Deserialize, Serialize};

/// Catalog entry describing a supported kind of device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceType {
    name: String,
    supports_cleanup: bool,
    download_instructions: String,
}

impl DeviceType {
    /// Creates a device type with no cleanup support and no instructions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supports_cleanup: false,
            download_instructions: String::new(),
        }
    }

    /// Marks the device type as able to erase its on-device ride storage
    pub fn with_cleanup(mut self) -> Self {
        self.supports_cleanup = true;
        self
    }

    /// Sets the text shown to the user before a download starts
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.download_instructions = instructions.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_cleanup(&self) -> bool {
        self.supports_cleanup
    }

    pub fn download_instructions(&self) -> &str {
        &self.download_instructions
    }

    /// Text prompting the user to start a download with this device type
    pub fn ready_instructions(&self) -> String {
        if self.download_instructions.is_empty() {
            "Click Download to begin downloading.".to_string()
        } else {
            format!("{}, \nthen click Download.", self.download_instructions)
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
