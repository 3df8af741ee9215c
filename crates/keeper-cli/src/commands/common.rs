//! Shared helpers for command implementations.

use keeper_core::{Note, Tag};
use serde::Serialize;

use crate::context::AppContext;
use crate::error::CliError;

/// Resolve a note by full id or unique id prefix.
pub fn resolve_note(ctx: &AppContext, needle: &str) -> Result<Note, CliError> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(CliError::NoteNotFound("(empty)".to_string()));
    }

    let notes = ctx.notes.records();
    if let Some(exact) = notes.iter().find(|note| note.id == needle) {
        return Ok(exact.clone());
    }

    let matches: Vec<&Note> = notes
        .iter()
        .filter(|note| note.id.starts_with(needle))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(needle.to_string())),
        [single] => Ok((*single).clone()),
        several => Err(CliError::AmbiguousId(format!(
            "id prefix '{needle}' matches {} notes",
            several.len()
        ))),
    }
}

/// Resolve a tag by full id, unique id prefix, or exact label.
pub fn resolve_tag(ctx: &AppContext, needle: &str) -> Result<Tag, CliError> {
    let needle = needle.trim();
    let tags = ctx.tags.records();

    if let Some(exact) = tags
        .iter()
        .find(|tag| tag.id == needle || tag.label == needle)
    {
        return Ok(exact.clone());
    }

    let matches: Vec<&Tag> = tags
        .iter()
        .filter(|tag| tag.id.starts_with(needle))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::TagNotFound(needle.to_string())),
        [single] => Ok((*single).clone()),
        several => Err(CliError::AmbiguousId(format!(
            "id prefix '{needle}' matches {} tags",
            several.len()
        ))),
    }
}

/// Map tag labels to tag ids, creating missing tags locally.
pub fn ensure_tags(ctx: &AppContext, labels: &[String]) -> Result<Vec<String>, CliError> {
    let mut ids = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        let existing = ctx
            .tags
            .records()
            .into_iter()
            .find(|tag| tag.label == label);
        let tag = match existing {
            Some(tag) => tag,
            None => ctx.tags.insert(Tag::new(label))?,
        };
        if !ids.contains(&tag.id) {
            ids.push(tag.id);
        }
    }
    Ok(ids)
}

/// Labels of the tags a note references, in the note's order. Dangling tag
/// ids are skipped, matching how the web client renders them.
pub fn tag_labels(ctx: &AppContext, note: &Note) -> Vec<String> {
    let tags = ctx.tags.records();
    note.tag_ids
        .iter()
        .filter_map(|id| tags.iter().find(|tag| &tag.id == id))
        .map(|tag| tag.label.clone())
        .collect()
}

/// Sync status badge, mirroring the web client: `synced`, `updated` (was on
/// the server but diverged), or `local`.
pub fn sync_badge(note: &Note) -> &'static str {
    if note.synced {
        "synced"
    } else if note.is_on_server() {
        "updated"
    } else {
        "local"
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub status: String,
    pub permalink: Option<String>,
}

pub fn note_to_list_item(ctx: &AppContext, note: &Note) -> NoteListItem {
    NoteListItem {
        id: note.id.clone(),
        title: note.title.clone(),
        tags: tag_labels(ctx, note),
        status: sync_badge(note).to_string(),
        permalink: note.permalink.clone(),
    }
}

pub fn format_note_line(ctx: &AppContext, note: &Note) -> String {
    let labels = tag_labels(ctx, note);
    let tags = if labels.is_empty() {
        String::new()
    } else {
        format!("  [{}]", labels.join(", "))
    };
    format!(
        "{}  {:<8}  {}{}",
        short_id(&note.id),
        sync_badge(note),
        note.title,
        tags
    )
}
