//! Per-file step recording for external execution trackers.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ferry_telemetry::Metrics;
use serde::Serialize;

use crate::model::{DeliveryResult, DeliveryStatus};

/// One delivered (or failed) file as reported to a recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Source file name.
    pub file_name: String,
    /// Destination path.
    pub destination: PathBuf,
    /// Bytes written.
    pub size_bytes: u64,
    /// Delivery status.
    pub status: DeliveryStatus,
}

impl From<&DeliveryResult> for StepRecord {
    fn from(result: &DeliveryResult) -> Self {
        Self {
            file_name: result.file_name.clone(),
            destination: result.output_path.clone(),
            size_bytes: result.size_bytes,
            status: result.status,
        }
    }
}

/// Receives one record per delivery attempt.
pub trait StepRecorder: Send + Sync {
    /// Called on the delivery worker just before the write of `file_name` begins.
    fn step_started(&self, _file_name: &str) {}

    /// Record a delivery attempt.
    fn record_step(&self, step: &StepRecord);
}

impl StepRecorder for Metrics {
    fn record_step(&self, step: &StepRecord) {
        self.record_delivery(step.status.as_str(), step.size_bytes);
    }
}

/// Recorder that keeps every step in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    steps: Mutex<Vec<StepRecord>>,
}

impl MemoryRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded steps.
    #[must_use]
    pub fn steps(&self) -> Vec<StepRecord> {
        self.lock_steps().clone()
    }

    fn lock_steps(&self) -> MutexGuard<'_, Vec<StepRecord>> {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StepRecorder for MemoryRecorder {
    fn record_step(&self, step: &StepRecord) {
        self.lock_steps().push(step.clone());
    }
}
