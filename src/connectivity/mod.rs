//! Connectivity module
//!
//! Handles:
//! - Reachability probing with a cached answer
//! - Remote/Local store mode selection

mod mode;
mod probe;

pub use mode::{ModeSelector, StoreMode};
pub use probe::{ConnectivityProbe, Reachability, TcpReachability};

#[cfg(test)]
pub(crate) use probe::MockReachability;
