//! Tag model

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{merge_opt, Reconcilable};

/// A tag for organizing notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Client-generated identifier
    pub id: String,
    /// Server-assigned identifier, present once synced at least once
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub label: String,
}

impl Tag {
    /// Create a new local-only tag.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            server_id: None,
            synced: false,
            updated_at: Some(Local::now().fixed_offset()),
            label: label.into(),
        }
    }

    /// Copy with a new label, marked diverged from the server.
    #[must_use]
    pub fn renamed(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            synced: false,
            updated_at: Some(Local::now().fixed_offset()),
            ..self.clone()
        }
    }
}

impl Reconcilable for Tag {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn updated_at(&self) -> Option<&DateTime<FixedOffset>> {
        self.updated_at.as_ref()
    }

    // A tag created locally with the same text as one synced from elsewhere
    // is the same tag; reconciliation coalesces the two by label.
    fn coalesce_label(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn merged(base: &Self, overlay: &Self) -> Self {
        Self {
            id: overlay.id.clone(),
            server_id: merge_opt(&base.server_id, &overlay.server_id),
            synced: overlay.synced,
            updated_at: merge_opt(&base.updated_at, &overlay.updated_at),
            label: overlay.label.clone(),
        }
    }

    fn unsynced(&self) -> Self {
        Self {
            server_id: None,
            synced: false,
            ..self.clone()
        }
    }

    fn detached(&self) -> Self {
        self.unsynced()
    }
}
