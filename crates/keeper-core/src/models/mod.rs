//! Data model shared by the local store, remote client, and sync engine.

mod note;
mod record;
mod tag;

pub use note::Note;
pub use record::{adjusted_epoch_millis, Reconcilable};
pub use tag::Tag;
