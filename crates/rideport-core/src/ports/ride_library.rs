//! Ride library port (driven/secondary port)
//!
//! The library owns the directory finalized rides are committed into and is
//! told about every ride that lands there.

use std::path::Path;

/// Port trait for the local ride library
#[async_trait::async_trait]
pub trait IRideLibrary: Send + Sync {
    /// Directory finalized ride files are committed into
    fn root(&self) -> &Path;

    /// Registers a ride that was committed into [`IRideLibrary::root`]
    ///
    /// Called exactly once per successfully finalized file, with the bare
    /// file name (no directory component).
    async fn add_ride(&self, file_name: &str) -> anyhow::Result<()>;
}
