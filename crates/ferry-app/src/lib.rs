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

//! Ferry application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (environment loading, logging, run scheduling),
//! `error.rs` (application error type).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;

pub use bootstrap::{ENV_CONFIG_PATH, ENV_LOG_FORMAT, run_app};
pub use error::{AppError, AppResult};
