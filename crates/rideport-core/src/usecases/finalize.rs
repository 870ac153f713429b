//! Ride finalizer - commits temporary files into the ride library
//!
//! The finalizer is the only code that touches files inside the library
//! directory. A ride lands there through a single `rename`, so other readers
//! of the library see either the old file or the complete new one.

use tracing::{debug, info, warn};

use crate::{
    domain::ride::DownloadedFile,
    ports::{
        download_observer::{IDownloadObserver, OverwriteDecision},
        ride_library::IRideLibrary,
    },
};

use super::device_session::discard_partial;

/// What happened to one downloaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The file is in the library under this name
    Committed(String),
    /// The library already had the ride and the user kept it
    Skipped(String),
    /// The file could not be moved into the library
    Failed { file_name: String, reason: String },
}

impl FinalizeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FinalizeOutcome::Failed { .. })
    }
}

/// Commits downloaded files into an [`IRideLibrary`]
pub struct RideFinalizer<'a> {
    library: &'a dyn IRideLibrary,
    overwrite_policy: Option<OverwriteDecision>,
    keep_failed_temp_files: bool,
}

impl<'a> RideFinalizer<'a> {
    /// Creates a finalizer that asks the observer about every conflict
    pub fn new(library: &'a dyn IRideLibrary) -> Self {
        Self {
            library,
            overwrite_policy: None,
            keep_failed_temp_files: false,
        }
    }

    /// Answers overwrite conflicts without asking
    pub fn with_overwrite_policy(mut self, policy: Option<OverwriteDecision>) -> Self {
        self.overwrite_policy = policy;
        self
    }

    /// Leaves the temporary file on disk when committing it fails
    pub fn keep_failed_temp_files(mut self, keep: bool) -> Self {
        self.keep_failed_temp_files = keep;
        self
    }

    /// Moves one downloaded file into the library
    ///
    /// The temporary file never survives this call unless committing failed
    /// and `keep_failed_temp_files` is set.
    pub async fn finalize(
        &self,
        file: &DownloadedFile,
        observer: &dyn IDownloadObserver,
    ) -> FinalizeOutcome {
        let file_name = file.library_file_name();
        let destination = self.library.root().join(&file_name);
        let temp = file.temp_path();

        let exists = match tokio::fs::try_exists(&destination).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(to = %destination.display(), error = %e, "Cannot check library for ride");
                observer
                    .report_status(&format!("cannot check {}: {e}", destination.display()))
                    .await;
                return self.fail(file, file_name, e).await;
            }
        };
        if exists {
            let decision = match self.overwrite_policy {
                Some(policy) => policy,
                None => {
                    let description = format!(
                        "The ride starting at {} appears to have already been downloaded.",
                        file.start_time().format("%a %b %-d %H:%M:%S %Y")
                    );
                    observer.resolve_overwrite_conflict(&description).await
                }
            };
            debug!(file = %file_name, decision = %decision, "Ride already in library");

            if decision == OverwriteDecision::Skip {
                discard_partial(temp).await;
                observer
                    .report_status(&format!("skipped file {}", temp.display()))
                    .await;
                return FinalizeOutcome::Skipped(file_name);
            }
        }

        let committed = match tokio::fs::create_dir_all(self.library.root()).await {
            Ok(()) => tokio::fs::rename(temp, &destination).await,
            Err(e) => Err(e),
        };

        if let Err(e) = committed {
            warn!(
                from = %temp.display(),
                to = %destination.display(),
                error = %e,
                "Failed to move ride into library"
            );
            observer
                .report_status(&format!(
                    "failed to rename {} to {}",
                    temp.display(),
                    file_name
                ))
                .await;
            return self.fail(file, file_name, e).await;
        }

        info!(file = %file_name, "Ride committed to library");
        if let Err(e) = self.library.add_ride(&file_name).await {
            warn!(file = %file_name, error = %e, "Library did not register ride");
            observer
                .report_status(&format!("failed to register {file_name}: {e}"))
                .await;
        }

        FinalizeOutcome::Committed(file_name)
    }

    async fn fail(
        &self,
        file: &DownloadedFile,
        file_name: String,
        error: std::io::Error,
    ) -> FinalizeOutcome {
        if !self.keep_failed_temp_files {
            discard_partial(file.temp_path()).await;
        }
        FinalizeOutcome::Failed {
            file_name,
            reason: error.to_string(),
        }
    }
}
