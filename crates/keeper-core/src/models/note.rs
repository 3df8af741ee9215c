//! Note model

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{merge_opt, Reconcilable};

/// A note with identity, payload, and sync status.
///
/// Field names on the wire match the Keeper service: the server-assigned id
/// travels as `_id`, payload references tags through `tagIds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Client-generated identifier, never changed after creation
    pub id: String,
    /// Server-assigned identifier, present once synced at least once
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Whether the local copy matches the last known server copy
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,
    /// Timestamp of the last local mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<FixedOffset>>,
    /// Server-assigned owner, cleared on unconfirmed local mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Public share token, present while a read-only link is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    pub title: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

impl Note {
    /// Create a new local-only note. It stays absent from the server until
    /// an explicit sync.
    #[must_use]
    pub fn new(title: impl Into<String>, markdown: impl Into<String>, tag_ids: Vec<String>) -> Self {
        let now = Local::now().fixed_offset();
        Self {
            id: Uuid::new_v4().to_string(),
            server_id: None,
            synced: false,
            created_at: Some(now),
            updated_at: Some(now),
            created_by: None,
            permalink: None,
            title: title.into(),
            markdown: markdown.into(),
            tag_ids,
        }
    }

    /// Copy with an edited payload. Marks the note diverged from the server
    /// and drops server-assigned metadata until the next confirmed sync.
    #[must_use]
    pub fn with_edit(
        &self,
        title: impl Into<String>,
        markdown: impl Into<String>,
        tag_ids: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            markdown: markdown.into(),
            tag_ids,
            synced: false,
            updated_at: Some(Local::now().fixed_offset()),
            created_by: None,
            permalink: None,
            ..self.clone()
        }
    }

    /// Copy with the share link set or cleared. Refreshes `updated_at` so the
    /// link change wins the next timestamp comparison.
    #[must_use]
    pub fn with_share_link(&self, permalink: Option<String>) -> Self {
        Self {
            permalink,
            updated_at: Some(Local::now().fixed_offset()),
            ..self.clone()
        }
    }

    /// Whether this note has ever reached the server.
    #[must_use]
    pub fn is_on_server(&self) -> bool {
        self.server_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

impl Reconcilable for Note {
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

    fn merged(base: &Self, overlay: &Self) -> Self {
        Self {
            id: overlay.id.clone(),
            server_id: merge_opt(&base.server_id, &overlay.server_id),
            synced: overlay.synced,
            created_at: merge_opt(&base.created_at, &overlay.created_at),
            updated_at: merge_opt(&base.updated_at, &overlay.updated_at),
            created_by: merge_opt(&base.created_by, &overlay.created_by),
            permalink: merge_opt(&base.permalink, &overlay.permalink),
            title: overlay.title.clone(),
            markdown: overlay.markdown.clone(),
            tag_ids: overlay.tag_ids.clone(),
        }
    }

    fn unsynced(&self) -> Self {
        Self {
            server_id: None,
            created_by: None,
            permalink: None,
            synced: false,
            ..self.clone()
        }
    }

    fn detached(&self) -> Self {
        Self {
            server_id: None,
            created_by: None,
            synced: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_note_starts_unsynced() {
        let note = Note::new("Groceries", "- milk", vec![]);
        assert!(!note.synced);
        assert!(note.server_id.is_none());
        assert!(note.updated_at.is_some());
        assert!(!note.is_on_server());
    }

    #[test]
    fn note_ids_are_unique() {
        let a = Note::new("a", "", vec![]);
        let b = Note::new("b", "", vec![]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn edit_clears_server_metadata() {
        let mut note = Note::new("Draft", "text", vec![]);
        note.server_id = Some("s1".to_string());
        note.created_by = Some("u1".to_string());
        note.permalink = Some("p1".to_string());
        note.synced = true;

        let edited = note.with_edit("Draft v2", "text v2", vec!["t1".to_string()]);
        assert_eq!(edited.title, "Draft v2");
        assert_eq!(edited.tag_ids, vec!["t1".to_string()]);
        assert!(!edited.synced);
        assert!(edited.created_by.is_none());
        assert!(edited.permalink.is_none());
        // The server id survives an edit; only a delete or sweep clears it.
        assert_eq!(edited.server_id.as_deref(), Some("s1"));
        assert_eq!(edited.id, note.id);
    }

    #[test]
    fn merged_lets_overlay_win_payload_and_keeps_base_options() {
        let mut local = Note::new("local title", "local body", vec!["t1".to_string()]);
        local.permalink = Some("local-link".to_string());
        let mut remote = Note::new("remote title", "remote body", vec![]);
        remote.id.clone_from(&local.id);
        remote.server_id = Some("s9".to_string());
        remote.permalink = None;

        let merged = Note::merged(&local, &remote);
        assert_eq!(merged.title, "remote title");
        assert_eq!(merged.tag_ids, Vec::<String>::new());
        assert_eq!(merged.server_id.as_deref(), Some("s9"));
        // Optional field absent on the overlay falls back to the base.
        assert_eq!(merged.permalink.as_deref(), Some("local-link"));
    }

    #[test]
    fn unsynced_clears_all_server_linkage() {
        let mut note = Note::new("n", "", vec![]);
        note.server_id = Some("s1".to_string());
        note.created_by = Some("u1".to_string());
        note.permalink = Some("p1".to_string());
        note.synced = true;

        let swept = note.unsynced();
        assert!(swept.server_id.is_none());
        assert!(swept.created_by.is_none());
        assert!(swept.permalink.is_none());
        assert!(!swept.synced);
        assert_eq!(swept.title, note.title);
    }

    #[test]
    fn detached_keeps_the_share_link() {
        let mut note = Note::new("n", "", vec![]);
        note.server_id = Some("s1".to_string());
        note.permalink = Some("p1".to_string());
        note.synced = true;

        let detached = note.detached();
        assert!(detached.server_id.is_none());
        assert!(!detached.synced);
        assert_eq!(detached.permalink.as_deref(), Some("p1"));
    }

    #[test]
    fn wire_names_match_keeper_service() {
        let mut note = Note::new("n", "body", vec!["t1".to_string()]);
        note.server_id = Some("s1".to_string());
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["_id"], "s1");
        assert_eq!(json["tagIds"][0], "t1");
        assert!(json.get("createdBy").is_none());
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let note: Note = serde_json::from_str(
            r#"{"id":"1","title":"bare","markdown":"","tagIds":[],"synced":false}"#,
        )
        .unwrap();
        assert!(note.server_id.is_none());
        assert!(note.updated_at.is_none());
    }
}
