/// Utility helpers for gateway operations
///
/// Timing instrumentation for the chunked operations.

use std::time::{Duration, Instant};
use tracing::debug;

/// Timer for measuring operation duration
pub struct OperationTimer {
    start: Instant,
    operation_name: &'static str,
}

impl OperationTimer {
    /// Start a new timer
    pub fn start(operation_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation_name,
        }
    }

    /// Stop the timer, logging and returning the duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        debug!("operation '{}' completed in {:?}", self.operation_name, duration);
        duration
    }
}
