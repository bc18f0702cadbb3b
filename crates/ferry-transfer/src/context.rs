//! Execution context shared between the collection and delivery stages of one run.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::{DeliveryResult, TransferUnit};

/// Per-run hand-off between collection and delivery.
///
/// Serialises with the key names external flow consumers expect
/// (`filesToProcess`, `receiverProcessingSuccessful`, `successfulFiles`).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Units produced by collection, in processing order.
    pub files_to_process: Vec<TransferUnit>,
    /// Set by delivery: every unit was read and delivered.
    pub receiver_processing_successful: bool,
    /// Source names delivered successfully.
    pub successful_files: Vec<String>,
    /// Free-form values owned by the surrounding flow.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of every delivery attempt.
    ///
    /// Units that failed to read count against `receiver_processing_successful`
    /// even though delivery never attempted them.
    pub fn record_deliveries(&mut self, results: &[DeliveryResult]) {
        self.successful_files = results
            .iter()
            .filter(|result| result.succeeded())
            .map(|result| result.file_name.clone())
            .collect();
        self.receiver_processing_successful = results.iter().all(DeliveryResult::succeeded)
            && self.files_to_process.iter().all(TransferUnit::is_readable);
    }

    /// Set a free-form attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// JSON rendering for external consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute value fails to serialise.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
