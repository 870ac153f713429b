//! RidePort Core - Domain logic for downloading rides from training devices
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Port`, `DeviceType`, `RideItem`, `DownloadedFile`, `WorkflowState`
//! - **Use cases** - `DeviceSession`, `DownloadOrchestrator`, `RideFinalizer`
//! - **Port definitions** - Traits for adapters: `IPortEnumerator`, `IDeviceFactory`,
//!   `IDeviceDriver`, `IDownloadObserver`, `IRideLibrary`
//! - **Registry** - Device-type catalog keyed by name
//!
//! # Architecture
//!
//! The domain module contains pure data and state tables with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases drive devices and the library through those ports.

pub mod config;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod usecases;
