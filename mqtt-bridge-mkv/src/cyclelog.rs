//! Per-cycle log blocks.
//!
//! Every poll cycle is logged as one block: a start line, one line per
//! reading (or the error), and an end line. Blocks from concurrent pollers
//! never interleave; the lock is held while one block is written, not
//! while the device is being polled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use hubbridge_common::PollResult;
use hubbridge_framework::PublishStats;

/// Shared writer of cycle blocks. Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct CycleLog {
    lock: Arc<Mutex<()>>,
}

/// What happened in one cycle, as far as the log is concerned.
#[derive(Debug)]
pub struct CycleSummary<'a> {
    pub result: &'a PollResult,
    pub device_type: &'a str,
    pub host: &'a str,
    pub elapsed: Duration,
    /// Discovery and state publishes combined; `None` if nothing was published.
    pub published: Option<PublishStats>,
}

impl CycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the block for one cycle.
    pub async fn emit(&self, cycle: CycleSummary<'_>) {
        let result = cycle.result;
        let device = result.device.as_str();

        let _block = self.lock.lock().await;

        info!(
            device = %device,
            device_type = %cycle.device_type,
            host = %cycle.host,
            timestamp = result.timestamp,
            "Cycle start"
        );

        if let Some(raw) = &result.raw_answer {
            debug!(device = %device, answer = %raw, "Raw answer");
        }

        match &result.error {
            Some(e) => error!(device = %device, error = %e, "Cycle failed, nothing published"),
            None => {
                for reading in &result.readings {
                    info!(
                        device = %device,
                        register = %reading.register,
                        "{} = {} {}",
                        reading.name,
                        reading.value,
                        reading.unit
                    );
                }
            }
        }

        if let Some(stats) = cycle.published {
            if stats.failed > 0 {
                error!(
                    device = %device,
                    failed = stats.failed,
                    total = stats.total(),
                    "Some messages could not be published"
                );
            } else {
                debug!(device = %device, published = stats.success, "Published");
            }
        }

        info!(
            device = %device,
            readings = result.readings.len(),
            elapsed_ms = cycle.elapsed.as_millis() as u64,
            "Cycle end"
        );
    }
}
