//! Devices command - List supported device types

use anyhow::{Context, Result};
use clap::Args;

use super::CommandContext;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct DevicesCommand {}

impl DevicesCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let registry =
            rideport_device::builtin_registry().context("Failed to build device registry")?;

        let mut types = Vec::new();
        for name in registry.type_names() {
            let handle = registry.get_type(&name)?;
            types.push(handle.device_type().clone());
        }

        if ctx.format.is_json() {
            let json: Vec<serde_json::Value> = types
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name(),
                        "supports_erase": t.supports_cleanup(),
                        "instructions": t.ready_instructions(),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "device_types": json }));
            return Ok(());
        }

        formatter.success(&format!("{} device type(s) supported", types.len()));
        for device_type in &types {
            let erase = if device_type.supports_cleanup() {
                "download, erase"
            } else {
                "download"
            };
            formatter.info(&format!("{} ({erase})", device_type.name()));
        }
        Ok(())
    }
}
