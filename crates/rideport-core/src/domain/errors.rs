//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Port identifier was empty
    #[error("Invalid port identifier: {0:?}")]
    InvalidPortId(String),

    /// Ride file extension was empty or contained a path separator
    #[error("Invalid file extension: {0:?}")]
    InvalidExtension(String),
}
