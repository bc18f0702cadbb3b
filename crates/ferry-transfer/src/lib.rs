#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Directory-to-directory file transfer pipeline.
//!
//! A run scans the source directory, filters candidates through an ordered
//! validation chain, reads survivors into transfer units, writes them to the
//! target directory under a naming and write strategy, and post-processes
//! each source (archive, delete, mark, or keep) once its write is confirmed.
//! Rejected files can be quarantined into an error directory.

pub mod context;
mod delivery;
pub mod error;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod postprocess;
pub mod quarantine;
pub mod recorder;
mod relocate;
pub mod scanner;
pub mod stability;
pub mod validation;
pub mod write;

pub use context::ExecutionContext;
pub use error::{TransferError, TransferResult};
pub use model::{
    Decision, DeliveryResult, DeliveryStatus, FileCandidate, FileFailure, ReadStatus,
    RejectCategory, RunReport, TransferUnit, ValidationOutcome,
};
pub use naming::output_file_name;
pub use pipeline::{Clock, TransferPipeline};
pub use postprocess::{PostProcessOutcome, PostProcessStatus, apply_post_process};
pub use quarantine::quarantine_file;
pub use recorder::{MemoryRecorder, StepRecord, StepRecorder};
pub use scanner::scan;
pub use validation::ValidationChain;
pub use write::write_content;
