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

//! Telemetry primitives shared across the Ferry workspace.
//!
//! This crate centralises logging and metrics so the collector, delivery, and
//! application surfaces share a consistent observability story.
//!
//! Layout: `init.rs` (subscriber setup), `context.rs` (application span),
//! `metrics.rs` (Prometheus registry), `error.rs` (error types).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, record_app_mode};
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_config,
};
pub use metrics::{Metrics, MetricsSnapshot};
