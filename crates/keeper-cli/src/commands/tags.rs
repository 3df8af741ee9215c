//! Tag commands.

use serde::Serialize;

use crate::commands::common::{resolve_tag, short_id};
use crate::context::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TagListItem {
    id: String,
    label: String,
    notes: usize,
    synced: bool,
}

pub fn list(ctx: &AppContext, json: bool) -> Result<(), CliError> {
    let tags = ctx.tags.records();
    let notes = ctx.notes.records();

    let items: Vec<TagListItem> = tags
        .iter()
        .map(|tag| TagListItem {
            id: tag.id.clone(),
            label: tag.label.clone(),
            notes: notes
                .iter()
                .filter(|note| note.tag_ids.contains(&tag.id))
                .count(),
            synced: tag.synced,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No tags.");
        return Ok(());
    }
    for item in &items {
        println!(
            "{}  {:<20}  {} note{}",
            short_id(&item.id),
            item.label,
            item.notes,
            if item.notes == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

pub fn rename(ctx: &AppContext, tag: &str, label: &str) -> Result<(), CliError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CliError::Config("tag label must not be empty".to_string()));
    }
    let tag = resolve_tag(ctx, tag)?;
    let renamed = ctx
        .tags
        .update_with(&tag.id, |current| current.renamed(label))?;
    println!("Renamed tag '{}' to '{}'", tag.label, renamed.label);
    Ok(())
}

/// Remove the tag and detach its id from every note that referenced it.
/// Detaching is a note edit, so affected notes are marked diverged.
pub fn delete(ctx: &AppContext, tag: &str) -> Result<(), CliError> {
    let tag = resolve_tag(ctx, tag)?;

    let tagged: Vec<String> = ctx
        .notes
        .records()
        .into_iter()
        .filter(|note| note.tag_ids.contains(&tag.id))
        .map(|note| note.id)
        .collect();
    for note_id in &tagged {
        ctx.notes.update_with(note_id, |note| {
            let tag_ids: Vec<String> = note
                .tag_ids
                .iter()
                .filter(|id| *id != &tag.id)
                .cloned()
                .collect();
            note.with_edit(&note.title, &note.markdown, tag_ids)
        })?;
    }

    ctx.tags.remove(&tag.id)?;
    println!(
        "Deleted tag '{}' (detached from {} note{})",
        tag.label,
        tagged.len(),
        if tagged.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
