//! Ports command - List attached ports
//!
//! Runs one scan, shows every port with its chipset hints, any driver
//! warning, and the device type that would be used.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{build_orchestrator, CommandContext};
use crate::observer::ConsoleObserver;
use crate::output::get_formatter;
use rideport_core::usecases::OrchestratorOptions;

#[derive(Debug, Args)]
pub struct PortsCommand {}

impl PortsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let options = OrchestratorOptions::from_config(&ctx.config);
        let mut orchestrator = build_orchestrator(&ctx.config, options)?;

        let observer = ConsoleObserver::new(ctx.format);
        let scan = orchestrator.scan(&observer).await?;
        info!(ports = scan.ports.len(), "Ports listed");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "ports": scan.ports,
                "warning": scan.warning,
                "state": orchestrator.state(),
                "device_type": orchestrator.device_type_name(),
                "selected_port": orchestrator.selected_port(),
            }));
            return Ok(());
        }

        if scan.ports.is_empty() {
            return Ok(());
        }
        formatter.success(&format!("{} port(s) found", scan.ports.len()));
        for port in &scan.ports {
            let marker = if orchestrator.selected_port() == Some(port.id()) {
                "*"
            } else {
                " "
            };
            formatter.info(&format!("{marker} {port}"));
            if !port.hints().is_empty() {
                formatter.info(&format!("    hints: {}", port.hints().join(", ")));
            }
        }
        formatter.info("");
        formatter.info(&format!("Device type: {}", orchestrator.device_type_name()));
        Ok(())
    }
}

