//! Delivery of one transfer unit: naming, write, then post-processing.
//!
//! A job runs on a blocking worker. Once a write has started the job always
//! runs to the end, post-processing included, so shutdown never leaves a
//! delivered file without its post-processing.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use ferry_config::{EmptyMessageHandling, OutputNamingMode, TransferConfig, WriteMode};
use tracing::debug;

use crate::model::{DeliveryResult, DeliveryStatus, TransferUnit};
use crate::naming::output_file_name;
use crate::postprocess::{PostProcessOutcome, apply_post_process};
use crate::write::write_content;

/// Output name and path chosen for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Destination {
    pub(crate) file_name: String,
    pub(crate) path: PathBuf,
}

/// Settings a delivery worker needs, detached from the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryJob {
    target_directory: PathBuf,
    naming_mode: OutputNamingMode,
    custom_pattern: Option<String>,
    write_mode: WriteMode,
    empty_message_handling: EmptyMessageHandling,
    add_timestamp: bool,
}

impl DeliveryJob {
    pub(crate) fn from_config(config: &TransferConfig) -> Self {
        Self {
            target_directory: config.target_directory.clone(),
            naming_mode: config.output_naming_mode,
            custom_pattern: config.custom_filename_pattern.clone(),
            write_mode: config.write_mode,
            empty_message_handling: config.empty_message_handling,
            add_timestamp: config.add_timestamp,
        }
    }

    /// Resolve the output name for `unit` at `now`.
    pub(crate) fn destination_for(&self, unit: &TransferUnit, now: NaiveDateTime) -> Destination {
        let file_name = output_file_name(
            &unit.file_name,
            self.naming_mode,
            self.custom_pattern.as_deref(),
            now,
        );
        let path = self.target_directory.join(&file_name);
        Destination { file_name, path }
    }

    /// Write the unit to `destination` and, only on success, post-process its source.
    pub(crate) fn run(
        &self,
        unit: &TransferUnit,
        destination: Destination,
        now: NaiveDateTime,
    ) -> (DeliveryResult, Option<PostProcessOutcome>) {
        let result = self.write(unit, destination);
        let post = result
            .succeeded()
            .then(|| apply_post_process(unit, self.add_timestamp, now));
        (result, post)
    }

    fn write(&self, unit: &TransferUnit, destination: Destination) -> DeliveryResult {
        let Destination {
            file_name: output_file_name,
            path: output_path,
        } = destination;

        if unit.content().is_empty()
            && self.empty_message_handling == EmptyMessageHandling::SkipEmptyMessages
        {
            debug!(file = %unit.file_name, "empty content; write skipped by policy");
            return DeliveryResult {
                file_name: unit.file_name.clone(),
                output_file_name,
                output_path,
                size_bytes: 0,
                status: DeliveryStatus::Success,
                error_message: None,
                skipped_empty: true,
            };
        }

        match write_content(&output_path, unit.content(), self.write_mode) {
            Ok(()) => DeliveryResult {
                file_name: unit.file_name.clone(),
                output_file_name,
                output_path,
                size_bytes: unit.size_bytes,
                status: DeliveryStatus::Success,
                error_message: None,
                skipped_empty: false,
            },
            Err(err) => DeliveryResult {
                file_name: unit.file_name.clone(),
                output_file_name,
                output_path,
                size_bytes: 0,
                status: DeliveryStatus::Failed,
                error_message: Some(err.detail()),
                skipped_empty: false,
            },
        }
    }
}
