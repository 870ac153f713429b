//! Config command - View and manage RidePort configuration
//!
//! Provides the `rideport config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the configuration file path
//! 3. Sets individual configuration values via dot-notation keys
//! 4. Validates the configuration file and reports errors

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use rideport_core::config::{ChipsetHint, Config};
use tracing::info;

use super::CommandContext;
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "conflicts.default_action")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx).await,
            ConfigCommand::Path => self.execute_path(ctx).await,
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value).await,
            ConfigCommand::Validate => self.execute_validate(ctx).await,
        }
    }

    async fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    async fn execute_path(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }

    async fn execute_set(&self, ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let mut config = ctx.config.clone();

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<34} - {help}"));
                }
            }
            return Ok(());
        }

        let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml).context("Failed to write configuration file")?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    async fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = &ctx.config_path;

        // Load explicitly so parse errors are reported instead of defaulted.
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {e}")
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else if config_path.exists() {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info("Using default configuration. Run 'rideport config set <key> <value>' to create one.");
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("library.root", "Directory rides are saved into"),
    ("download.auto_select_all", "true|false"),
    ("download.keep_failed_temp_files", "true|false"),
    ("download.temp_dir", "Temporary directory (\"none\" for default)"),
    ("conflicts.default_action", "ask|overwrite|skip"),
    ("devices.default_type", "Device type name (\"none\" to unset)"),
    ("devices.chipset_hints", "CHIPSET=TYPE[,CHIPSET=TYPE...]"),
    ("devices.mount_points", "Comma-separated directories"),
    ("devices.serial_globs", "Comma-separated glob patterns"),
    ("logging.level", "trace|debug|info|warn|error"),
];

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- library ---
        "library.root" => {
            config.library.root = PathBuf::from(value);
        }

        // --- download ---
        "download.auto_select_all" => {
            config.download.auto_select_all = value
                .parse::<bool>()
                .context("Expected true or false")?;
        }
        "download.keep_failed_temp_files" => {
            config.download.keep_failed_temp_files = value
                .parse::<bool>()
                .context("Expected true or false")?;
        }
        "download.temp_dir" => {
            config.download.temp_dir = optional(value).map(PathBuf::from);
        }

        // --- conflicts ---
        "conflicts.default_action" => {
            config.conflicts.default_action = value.to_string();
        }

        // --- devices ---
        "devices.default_type" => {
            config.devices.default_type = optional(value);
        }
        "devices.chipset_hints" => {
            let mut hints = Vec::new();
            for pair in list(value) {
                let (chipset, device_type) = pair
                    .split_once('=')
                    .with_context(|| format!("Expected CHIPSET=TYPE, got '{pair}'"))?;
                hints.push(ChipsetHint {
                    chipset: chipset.trim().to_string(),
                    device_type: device_type.trim().to_string(),
                });
            }
            config.devices.chipset_hints = hints;
        }
        "devices.mount_points" => {
            config.devices.mount_points = list(value).into_iter().map(PathBuf::from).collect();
        }
        "devices.serial_globs" => {
            config.devices.serial_globs = list(value);
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
