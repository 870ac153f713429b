//! Library command - Browse the ride library

use anyhow::{Context, Result};
use clap::Subcommand;
use rideport_library::DirectoryRideLibrary;

use super::CommandContext;
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum LibraryCommand {
    /// List the rides recorded in the library
    List,
}

impl LibraryCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            LibraryCommand::List => self.execute_list(ctx).await,
        }
    }

    async fn execute_list(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let library = DirectoryRideLibrary::new(ctx.config.library.root.clone());
        let entries = library
            .list()
            .await
            .context("Failed to read the library index")?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "library": ctx.config.library.root.display().to_string(),
                "rides": entries,
            }));
            return Ok(());
        }

        formatter.success(&format!(
            "{} ride(s) in {}",
            entries.len(),
            ctx.config.library.root.display()
        ));
        for entry in &entries {
            let size = match entry.size_bytes {
                Some(bytes) => format!("{} KB", bytes / 1024),
                None => "missing".to_string(),
            };
            formatter.info(&format!(
                "{}  {:>10}  added {}",
                entry.file_name,
                size,
                entry.added_at.format("%Y-%m-%d %H:%M")
            ));
        }
        Ok(())
    }
}
