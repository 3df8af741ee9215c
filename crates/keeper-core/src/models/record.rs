//! Shared record contract used by the sync engine.
//!
//! Every syncable record kind carries a client-generated `id` (the sole
//! correlation key between the local and remote copies), an optional
//! server-assigned id, and a `synced` flag marking whether the local copy is
//! known identical to the last-fetched server copy.

use chrono::{DateTime, FixedOffset};

/// A record that can be reconciled between the local store and the remote
/// collection.
///
/// `merged` is the explicit field-by-field replacement for the dynamic
/// `{...base, ...overlay}` merge: the overlay's required fields always win,
/// while its optional fields win only when present. Which side plays overlay
/// is the contract under test, not the mechanism.
pub trait Reconcilable: Clone {
    /// Client-generated stable identifier, assigned at creation.
    fn record_id(&self) -> &str;

    /// Server-assigned identifier; `None` means "never synced".
    fn server_id(&self) -> Option<&str>;

    /// Whether the local copy matches the last known server copy.
    fn is_synced(&self) -> bool;

    /// Timestamp of the last local mutation, used only for tie-breaking.
    fn updated_at(&self) -> Option<&DateTime<FixedOffset>>;

    /// Secondary match key for coalescing a pre-sync local record with a
    /// remote one that shares the same text (tags only).
    fn coalesce_label(&self) -> Option<&str> {
        None
    }

    /// Field-by-field merge with `overlay` taking precedence.
    #[must_use]
    fn merged(base: &Self, overlay: &Self) -> Self;

    /// Copy with every server-linkage field cleared and `synced` forced to
    /// `false`. Applied in bulk when authentication is lost.
    #[must_use]
    fn unsynced(&self) -> Self;

    /// Copy with the server identity stripped after a confirmed server-side
    /// delete. Unlike [`Reconcilable::unsynced`] this keeps the share link.
    #[must_use]
    fn detached(&self) -> Self;
}

/// Normalize a timestamp into the frame both replicas compare in: epoch
/// millis shifted by the recorded utc offset, matching
/// `getTime() + getTimezoneOffset() * 60000` on the original service's
/// clients.
pub fn adjusted_epoch_millis(at: &DateTime<FixedOffset>) -> i64 {
    at.timestamp_millis() - i64::from(at.offset().local_minus_utc()) * 1000
}

/// Overlay-wins merge of two optional fields.
pub(crate) fn merge_opt<T: Clone>(base: &Option<T>, overlay: &Option<T>) -> Option<T> {
    overlay.as_ref().or(base.as_ref()).cloned()
}
