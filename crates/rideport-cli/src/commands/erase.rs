//! Erase command - Erase the rides stored on a device

use anyhow::Result;
use clap::Args;
use rideport_core::usecases::OrchestratorOptions;
use tracing::info;

use super::{build_orchestrator, prepare, CommandContext};
use crate::observer::ConsoleObserver;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct EraseCommand {
    /// Port of the device to erase (defaults to the first one found)
    #[arg(long)]
    pub port: Option<String>,

    /// Device type (defaults to the configured or detected one)
    #[arg(long)]
    pub device: Option<String>,

    /// Do not ask for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

impl EraseCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let observer = ConsoleObserver::new(ctx.format);
        let options = OrchestratorOptions::from_config(&ctx.config);
        let mut orchestrator = build_orchestrator(&ctx.config, options)?;

        prepare(
            &mut orchestrator,
            self.port.as_deref(),
            self.device.as_deref(),
            &observer,
        )
        .await?;

        if !orchestrator.allowed_actions().erase {
            anyhow::bail!(
                "{} devices do not support erasing rides",
                orchestrator.device_type_name()
            );
        }
        if !self.yes {
            anyhow::bail!(
                "Erasing removes every ride stored on {}; pass --yes to confirm",
                orchestrator.selected_port().unwrap_or("the device")
            );
        }

        info!(port = ?orchestrator.selected_port(), "Erasing device");
        orchestrator.erase(&observer).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "port": orchestrator.selected_port(),
            }));
        } else {
            formatter.success("Device erased");
        }
        Ok(())
    }
}
