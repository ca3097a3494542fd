//! Multi-step orchestration controllers
//!
//! The two fixed two-phase protocols share one shape: ordered dependent
//! sub-operations built on the dispatcher, plus bounded polling. Each phase is
//! its own execution record in the store; the controllers link the phases,
//! gate the second on the first per device, and stop hard at the deadline so
//! an unreachable device cannot block the operator indefinitely.

pub mod reinstall;
pub mod restart;

use std::time::Duration;

/// Bounded polling options shared by the orchestration controllers
#[derive(Debug, Clone)]
pub struct Options {
    /// Fixed polling interval
    pub poll_interval: Duration,

    /// Hard wall-clock deadline measured from dispatch
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}
