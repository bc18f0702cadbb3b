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

//! Binary entrypoint that loads an adapter definition and runs the transfer pipeline.

use ferry_app::{AppResult, run_app};

/// Bootstraps the Ferry adapter and blocks until the last run finishes.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
