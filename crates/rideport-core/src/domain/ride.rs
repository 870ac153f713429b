//! Rides discovered on a device and files produced by a transfer

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Naming scheme for files committed to the ride library
const LIBRARY_NAME_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

fn validate_extension(extension: &str) -> Result<(), DomainError> {
    if extension.is_empty()
        || extension.starts_with('.')
        || extension.contains(['/', '\\'])
    {
        return Err(DomainError::InvalidExtension(extension.to_string()));
    }
    Ok(())
}

/// A ride stored on the device, selectable for transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideItem {
    /// Driver-assigned key identifying the ride on the device
    key: String,
    /// When the ride started, in the device's local time
    start_time: NaiveDateTime,
    /// File extension the transferred ride will carry (without the dot)
    extension: String,
    /// Size on the device, when the protocol reports it
    size_bytes: Option<u64>,
    /// Whether the ride should be transferred
    pub wanted: bool,
}

impl RideItem {
    /// Creates a ride that is not yet selected for transfer
    pub fn new(
        key: impl Into<String>,
        start_time: NaiveDateTime,
        extension: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let extension = extension.into();
        validate_extension(&extension)?;
        Ok(Self {
            key: key.into(),
            start_time,
            extension,
            size_bytes: None,
            wanted: false,
        })
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }
}

impl std::fmt::Display for RideItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ride {} starting {}",
            self.key,
            self.start_time.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// A ride that was fully transferred into a temporary file
///
/// The temporary file is owned by the workflow until it is either committed
/// into the library or discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    ride_key: String,
    start_time: NaiveDateTime,
    extension: String,
    temp_path: PathBuf,
}

impl DownloadedFile {
    pub fn new(
        ride_key: impl Into<String>,
        start_time: NaiveDateTime,
        extension: impl Into<String>,
        temp_path: PathBuf,
    ) -> Result<Self, DomainError> {
        let extension = extension.into();
        validate_extension(&extension)?;
        Ok(Self {
            ride_key: ride_key.into(),
            start_time,
            extension,
            temp_path,
        })
    }

    /// Builds the record for a transferred ride
    pub fn from_ride(ride: &RideItem, temp_path: PathBuf) -> Self {
        Self {
            ride_key: ride.key.clone(),
            start_time: ride.start_time,
            extension: ride.extension.clone(),
            temp_path,
        }
    }

    pub fn ride_key(&self) -> &str {
        &self.ride_key
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Name of the file once committed to the library
    ///
    /// `<year>_<month>_<day>_<hour>_<minute>_<second>.<extension>`,
    /// zero-padded, 24-hour clock.
    pub fn library_file_name(&self) -> String {
        format!(
            "{}.{}",
            self.start_time.format(LIBRARY_NAME_FORMAT),
            self.extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_library_file_name_is_zero_padded_24h() {
        let file = DownloadedFile::new("1", at(2009, 3, 7, 17, 4, 9), "srm", PathBuf::from("/t/x"))
            .unwrap();
        assert_eq!(file.library_file_name(), "2009_03_07_17_04_09.srm");
    }

    #[test]
    fn test_library_file_name_midnight() {
        let file =
            DownloadedFile::new("1", at(2024, 12, 31, 0, 0, 0), "fit", PathBuf::new()).unwrap();
        assert_eq!(file.library_file_name(), "2024_12_31_00_00_00.fit");
    }

    #[test]
    fn test_extension_validation() {
        let t = at(2024, 1, 1, 0, 0, 0);
        assert!(RideItem::new("k", t, "").is_err());
        assert!(RideItem::new("k", t, ".fit").is_err());
        assert!(RideItem::new("k", t, "a/b").is_err());
        assert!(RideItem::new("k", t, "tcx").is_ok());
    }

    #[test]
    fn test_new_ride_not_wanted() {
        let ride = RideItem::new("7", at(2024, 1, 1, 8, 0, 0), "fit")
            .unwrap()
            .with_size(1024);
        assert!(!ride.wanted);
        assert_eq!(ride.size_bytes(), Some(1024));
        assert_eq!(ride.to_string(), "ride 7 starting 2024-01-01 08:00:00");
    }

    #[test]
    fn test_from_ride_copies_metadata() {
        let ride = RideItem::new("7", at(2024, 1, 1, 8, 0, 0), "fit").unwrap();
        let file = DownloadedFile::from_ride(&ride, PathBuf::from("/tmp/a.part"));
        assert_eq!(file.ride_key(), "7");
        assert_eq!(file.extension(), "fit");
        assert_eq!(file.temp_path(), Path::new("/tmp/a.part"));
    }
}
