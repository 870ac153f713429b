//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IPortEnumerator`] - Probing the transport layer for attached ports
//! - [`IDeviceFactory`] / [`IDeviceDriver`] - Protocol-specific device access
//! - [`IDownloadObserver`] - Status, progress, conflict prompts and cancel requests (the UI)
//! - [`IRideLibrary`] - The local ride library notified of committed rides

pub mod device_driver;
pub mod download_observer;
pub mod port_enumerator;
pub mod ride_library;

pub use device_driver::{IDeviceDriver, IDeviceFactory, RideSink, TransferFault};
pub use download_observer::{IDownloadObserver, OverwriteDecision};
pub use port_enumerator::IPortEnumerator;
pub use ride_library::IRideLibrary;
