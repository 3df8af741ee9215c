//! keeper-core - Core library for Keeper
//!
//! Local-first notes and tags with optional account-based sync. This crate
//! holds the data model, the JSON local store, the remote Keeper client, the
//! authentication state, and the reconciliation engine shared by every
//! Keeper interface.

pub mod auth;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub(crate) mod util;

pub use error::{Error, Result};
pub use models::{Note, Reconcilable, Tag};
pub use sync::{reconcile, Collection, SyncEngine};
