// file: src/utils/telemetry.rs
// description: stage timing and throughput logging
// reference: tracing spans replaced by explicit timers around blocking work

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Logs start and completion of one stage call.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting operation: {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} in {:.2}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    /// Like `finish`, with a rows-per-second figure.
    pub fn finish_with_count(self, count: usize) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} - {} rows in {:.2}s ({:.0} rows/sec)",
            self.operation,
            count,
            elapsed.as_secs_f64(),
            if elapsed.as_secs_f64() > 0.0 {
                count as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            }
        );
        elapsed
    }

    pub fn warn_if_slow(&self, threshold: Duration, message: &str) {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "Slow operation [{}]: {} took {:.2}s (threshold: {:.2}s)",
                self.operation,
                message,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
    }
}

/// Timing of one model in a comparison run.
#[derive(Debug, Clone, Serialize)]
pub struct RunTiming {
    pub operation: String,
    pub duration_ms: u64,
}

impl RunTiming {
    pub fn new(operation: &str, duration: Duration) -> Self {
        Self {
            operation: operation.to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn format(&self) -> String {
        format!("{}: {}ms", self.operation, self.duration_ms)
    }
}
