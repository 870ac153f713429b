pub mod config;
pub mod devices;
pub mod download;
pub mod erase;
pub mod library;
pub mod ports;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rideport_core::{
    config::Config,
    domain::WorkflowState,
    ports::{IDownloadObserver, IRideLibrary},
    usecases::{DownloadOrchestrator, OrchestratorOptions},
};
use rideport_device::{builtin_registry, enumerator_from_config};
use rideport_library::DirectoryRideLibrary;

use crate::output::OutputFormat;

/// State shared by every command
pub struct CommandContext {
    pub config_path: PathBuf,
    pub config: Config,
    pub format: OutputFormat,
}

/// Wires the built-in devices, the configured ports and the library
pub fn build_orchestrator(
    config: &Config,
    options: OrchestratorOptions,
) -> Result<DownloadOrchestrator> {
    let registry = builtin_registry().context("Failed to build device registry")?;
    let library: Arc<dyn IRideLibrary> =
        Arc::new(DirectoryRideLibrary::new(config.library.root.clone()));
    Ok(DownloadOrchestrator::new(
        registry,
        enumerator_from_config(&config.devices),
        library,
        options,
    ))
}

/// Scans for ports and applies the user's port / device choices
///
/// Fails when no port is attached.
pub async fn prepare(
    orchestrator: &mut DownloadOrchestrator,
    port: Option<&str>,
    device: Option<&str>,
    observer: &dyn IDownloadObserver,
) -> Result<()> {
    orchestrator.scan(observer).await?;
    if orchestrator.state() == WorkflowState::Missing {
        anyhow::bail!("No devices found");
    }
    if let Some(name) = device {
        let instructions = orchestrator.set_device_type(name)?;
        observer.report_status(&instructions).await;
    }
    if let Some(id) = port {
        orchestrator.set_port(id)?;
    }
    Ok(())
}
