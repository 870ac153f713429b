//! Domain entities and business logic
//!
//! This module contains the core domain types for RidePort:
//! - Communication ports and the result of a port scan
//! - Device types (catalog entries) and their capabilities
//! - Rides discovered on a device and files produced by a transfer
//! - Workflow and session state machines, including the action table
//! - Domain-specific error types

pub mod device;
pub mod errors;
pub mod port;
pub mod ride;
pub mod workflow;

// Re-export commonly used types
pub use device::DeviceType;
pub use errors::DomainError;
pub use port::{Port, PortScan};
pub use ride::{DownloadedFile, RideItem};
pub use workflow::{ActionSet, SessionState, WorkflowState};
