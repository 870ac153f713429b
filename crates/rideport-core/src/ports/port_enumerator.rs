//! Port enumeration port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - `scan` is infallible: probe errors are folded into the warning text of
//!   the returned [`PortScan`] and an empty port list is a normal outcome.
//! - Implementations must not open the ports they list.

use crate::domain::port::PortScan;

/// Port trait for listing attached communication ports
#[async_trait::async_trait]
pub trait IPortEnumerator: Send + Sync {
    /// Lists the currently attached ports, in a stable order
    async fn scan(&self) -> PortScan;
}
