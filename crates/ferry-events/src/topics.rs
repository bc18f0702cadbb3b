//! Event topic identifiers used by audit consumers.

/// Machine-friendly discriminator for audit consumers.
#[must_use]
pub const fn event_kind(event: &crate::payloads::Event) -> &'static str {
    event.kind()
}

/// Whether the event describes a single file rather than a whole run.
#[must_use]
pub const fn is_file_scoped(event: &crate::payloads::Event) -> bool {
    use crate::payloads::Event;
    matches!(
        event,
        Event::FileValidated { .. }
            | Event::FileRejected { .. }
            | Event::FileQuarantined { .. }
            | Event::FileTransferred { .. }
            | Event::FileTransferFailed { .. }
            | Event::FilePostProcessed { .. }
    )
}
