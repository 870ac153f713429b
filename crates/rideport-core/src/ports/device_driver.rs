//! Device driver ports (driven/secondary ports)
//!
//! Protocol-specific collaborators plug into the workflow through two traits:
//!
//! - [`IDeviceFactory`] is the catalog entry. It describes the device type and
//!   binds a driver to a port without touching the transport.
//! - [`IDeviceDriver`] owns the transport for one session. The session calls
//!   `open` before anything else and `close` on every exit path.
//!
//! ## Design Notes
//!
//! - `open`, `list_rides`, `erase` and `close` use `anyhow::Result` because
//!   their failures are adapter-specific and only ever shown as text.
//! - `fetch_ride` returns a typed [`TransferFault`] so the session can tell a
//!   bad ride (skip it, keep going) from a dead link (abort the rest).

use tokio_util::sync::CancellationToken;

use crate::domain::{device::DeviceType, port::Port, ride::RideItem};

use super::download_observer::IDownloadObserver;

/// Destination a driver streams one ride into
pub type RideSink = dyn tokio::io::AsyncWrite + Unpin + Send;

/// Why a single ride could not be transferred
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferFault {
    /// This ride is unreadable; the transport is still usable
    #[error("{0}")]
    Ride(String),

    /// The transport failed; no further rides can be transferred
    #[error("{0}")]
    Link(String),

    /// Cancellation was observed between chunks
    #[error("cancelled")]
    Cancelled,
}

impl TransferFault {
    /// Returns true if the remaining transfers must be abandoned
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransferFault::Ride(_))
    }
}

/// Catalog entry able to bind drivers to ports
pub trait IDeviceFactory: Send + Sync {
    /// The device type this factory produces
    fn device_type(&self) -> &DeviceType;

    /// Returns true if a device of this type can be reached through `port`
    ///
    /// Decided from the port's name and hints alone. The default accepts
    /// every port.
    fn accepts(&self, _port: &Port) -> bool {
        true
    }

    /// Creates a driver bound to `port`
    ///
    /// Must not open the transport.
    fn connect(&self, port: &Port) -> Box<dyn IDeviceDriver>;
}

/// Protocol-specific access to one attached device
#[async_trait::async_trait]
pub trait IDeviceDriver: Send {
    /// Opens the transport and performs the protocol handshake
    async fn open(&mut self) -> anyhow::Result<()>;

    /// Enumerates the rides stored on the device
    ///
    /// May report status notes through `observer`.
    async fn list_rides(&mut self, observer: &dyn IDownloadObserver)
        -> anyhow::Result<Vec<RideItem>>;

    /// Streams one ride into `sink`, returning the number of bytes written
    ///
    /// Long transfers should report progress through `observer` and check
    /// `cancel` between chunks.
    async fn fetch_ride(
        &mut self,
        ride: &RideItem,
        sink: &mut RideSink,
        observer: &dyn IDownloadObserver,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferFault>;

    /// Erases all rides stored on the device
    async fn erase(&mut self) -> anyhow::Result<()>;

    /// Releases the transport
    async fn close(&mut self) -> anyhow::Result<()>;
}
