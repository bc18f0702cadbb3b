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

//! Audit event bus for the Ferry transfer pipeline.
//!
//! The bus carries typed transfer events with sequential identifiers and
//! replays recent events to subscribers that reconnect with the last id they
//! observed. Internally it uses `tokio::broadcast` with a bounded buffer; when
//! the channel overflows, the oldest events are dropped.
//!
//! Layout: `payloads.rs` (event types), `routing.rs` (bus), `topics.rs`
//! (discriminator helpers).

pub mod payloads;
pub mod routing;
pub mod topics;

pub use payloads::{DEFAULT_REPLAY_CAPACITY, DiscoveredFile, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
pub use topics::{event_kind, is_file_scoped};
