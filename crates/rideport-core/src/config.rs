//! Configuration module for RidePort.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ports::download_observer::OverwriteDecision;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for RidePort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub download: DownloadConfig,
    pub conflicts: ConflictsConfig,
    pub devices: DevicesConfig,
    pub logging: LoggingConfig,
}

/// Ride library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory downloaded rides are committed into.
    pub root: PathBuf,
}

/// Transfer and finalize settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Mark every discovered ride as wanted instead of asking the user.
    pub auto_select_all: bool,
    /// Keep the temporary file when committing it into the library fails.
    pub keep_failed_temp_files: bool,
    /// Where temporary files are written. Defaults to `<library.root>/.incoming`.
    pub temp_dir: Option<PathBuf>,
}

/// Overwrite-conflict settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// What to do when a ride is already in the library: `ask`, `overwrite`, or `skip`.
    pub default_action: String,
}

/// Device selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Device type selected when no chipset hint matches.
    pub default_type: Option<String>,
    /// Chipset substrings that identify a device type on the first listed port.
    pub chipset_hints: Vec<ChipsetHint>,
    /// Directories offered as ports for mass-storage devices.
    pub mount_points: Vec<PathBuf>,
    /// Glob patterns probed for serial device nodes.
    pub serial_globs: Vec<String>,
}

/// Maps a chipset name found on a port to the device type that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipsetHint {
    /// Substring matched against the port's display name and hints.
    pub chipset: String,
    /// Device type name to select when the substring matches.
    pub device_type: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/rideport/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("rideport")
            .join("config.yaml")
    }

    /// Directory temporary ride files are written into.
    pub fn temp_dir(&self) -> PathBuf {
        self.download
            .temp_dir
            .clone()
            .unwrap_or_else(|| self.library.root.join(".incoming"))
    }

    /// Fixed overwrite decision, or `None` when the user should be asked.
    pub fn overwrite_policy(&self) -> Option<OverwriteDecision> {
        match self.conflicts.default_action.as_str() {
            "overwrite" => Some(OverwriteDecision::Overwrite),
            "skip" => Some(OverwriteDecision::Skip),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("RidePort")
                .join("rides"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            auto_select_all: true,
            keep_failed_temp_files: false,
            temp_dir: None,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_action: "ask".to_string(),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            default_type: None,
            // SRM PCV download cables use the PL2303 chipset.
            chipset_hints: vec![ChipsetHint {
                chipset: "PL2303".to_string(),
                device_type: "SRM".to_string(),
            }],
            mount_points: Vec::new(),
            serial_globs: vec!["/dev/ttyUSB*".to_string(), "/dev/ttyACM*".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"conflicts.default_action"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_action`.
const VALID_CONFLICT_ACTIONS: &[&str] = &["ask", "overwrite", "skip"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- library ---
        if self.library.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "library.root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- download ---
        if let Some(ref temp) = self.download.temp_dir {
            if temp.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: "download.temp_dir".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }

        // --- conflicts ---
        if !VALID_CONFLICT_ACTIONS.contains(&self.conflicts.default_action.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_action".into(),
                message: format!(
                    "invalid action '{}'; valid: {}",
                    self.conflicts.default_action,
                    VALID_CONFLICT_ACTIONS.join(", ")
                ),
            });
        }

        // --- devices ---
        for (i, hint) in self.devices.chipset_hints.iter().enumerate() {
            if hint.chipset.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("devices.chipset_hints[{i}].chipset"),
                    message: "must not be empty".into(),
                });
            }
            if hint.device_type.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("devices.chipset_hints[{i}].device_type"),
                    message: "must not be empty".into(),
                });
            }
        }
        for (i, pattern) in self.devices.serial_globs.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: format!("devices.serial_globs[{i}]"),
                    message: format!("invalid glob pattern '{pattern}': {e}"),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- library ---

    pub fn library_root(mut self, root: PathBuf) -> Self {
        self.config.library.root = root;
        self
    }

    // --- download ---

    pub fn download_auto_select_all(mut self, enabled: bool) -> Self {
        self.config.download.auto_select_all = enabled;
        self
    }

    pub fn download_keep_failed_temp_files(mut self, keep: bool) -> Self {
        self.config.download.keep_failed_temp_files = keep;
        self
    }

    pub fn download_temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.download.temp_dir = Some(dir);
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_action(mut self, action: impl Into<String>) -> Self {
        self.config.conflicts.default_action = action.into();
        self
    }

    // --- devices ---

    pub fn devices_default_type(mut self, name: impl Into<String>) -> Self {
        self.config.devices.default_type = Some(name.into());
        self
    }

    pub fn devices_chipset_hint(
        mut self,
        chipset: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        self.config.devices.chipset_hints.push(ChipsetHint {
            chipset: chipset.into(),
            device_type: device_type.into(),
        });
        self
    }

    pub fn devices_mount_point(mut self, path: PathBuf) -> Self {
        self.config.devices.mount_points.push(path);
        self
    }

    pub fn devices_serial_globs(mut self, globs: Vec<String>) -> Self {
        self.config.devices.serial_globs = globs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
