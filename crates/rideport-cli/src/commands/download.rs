//! Download command - Download rides into the library
//!
//! Provides the `rideport download` CLI command which:
//! 1. Scans for ports and picks the port and device type
//! 2. Previews the device and selects rides (all, or interactively)
//! 3. Transfers and commits the rides, asking about overwrites
//! 4. Prints a summary; Ctrl+C cancels at the next checkpoint

use anyhow::Result;
use clap::Args;
use rideport_core::{ports::OverwriteDecision, usecases::OrchestratorOptions};
use tracing::info;

use super::{build_orchestrator, prepare, CommandContext};
use crate::observer::ConsoleObserver;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Port to download from (defaults to the first one found)
    #[arg(long)]
    pub port: Option<String>,

    /// Device type (defaults to the configured or detected one)
    #[arg(long)]
    pub device: Option<String>,

    /// Replace rides that are already in the library
    #[arg(long, conflicts_with = "skip")]
    pub overwrite: bool,

    /// Keep rides that are already in the library
    #[arg(long)]
    pub skip: bool,

    /// Choose which rides to download
    #[arg(long)]
    pub select: bool,
}

impl DownloadCommand {
    fn options(&self, ctx: &CommandContext) -> OrchestratorOptions {
        let mut options = OrchestratorOptions::from_config(&ctx.config);
        if self.overwrite {
            options.overwrite_policy = Some(OverwriteDecision::Overwrite);
        } else if self.skip {
            options.overwrite_policy = Some(OverwriteDecision::Skip);
        }
        if self.select {
            options.auto_select_all = false;
        }
        options
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let observer = ConsoleObserver::new(ctx.format);
        let mut orchestrator = build_orchestrator(&ctx.config, self.options(ctx))?;

        prepare(
            &mut orchestrator,
            self.port.as_deref(),
            self.device.as_deref(),
            &observer,
        )
        .await?;

        info!(
            port = ?orchestrator.selected_port(),
            device = %orchestrator.device_type_name(),
            library = %ctx.config.library.root.display(),
            "Starting download"
        );

        let cancel = orchestrator.cancel_handle();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        let result = orchestrator.download(&observer).await;
        watcher.abort();
        let summary = result?;

        if ctx.format.is_json() {
            let failures: Vec<String> = summary
                .ride_failures
                .iter()
                .map(|f| f.to_string())
                .chain(summary.finalize_failures.iter().cloned())
                .collect();
            formatter.print_json(&serde_json::json!({
                "success": summary.is_success(),
                "committed": summary.committed,
                "skipped": summary.skipped,
                "failures": failures,
                "library": ctx.config.library.root.display().to_string(),
            }));
        } else {
            formatter.success(&format!(
                "{} ride(s) saved to {}",
                summary.committed.len(),
                ctx.config.library.root.display()
            ));
            for name in &summary.committed {
                formatter.info(name);
            }
            if !summary.skipped.is_empty() {
                formatter.info(&format!("{} ride(s) already in the library", summary.skipped.len()));
            }
            if !summary.is_success() {
                formatter.warn(&format!("{} ride(s) failed", summary.failures()));
            }
        }

        if !summary.is_success() {
            anyhow::bail!("{} ride(s) failed to download", summary.failures());
        }
        Ok(())
    }
}
