//! Local note commands.

use keeper_core::Note;

use crate::commands::common::{
    ensure_tags, format_note_line, note_to_list_item, resolve_note, resolve_tag, sync_badge,
    tag_labels,
};
use crate::context::AppContext;
use crate::error::CliError;

pub fn add(
    ctx: &AppContext,
    title: &str,
    markdown: &str,
    tags: &[String],
) -> Result<(), CliError> {
    let tag_ids = ensure_tags(ctx, tags)?;
    let note = ctx.notes.insert(Note::new(title, markdown, tag_ids))?;
    println!("Created note {}", note.id);
    Ok(())
}

pub fn list(
    ctx: &AppContext,
    tag: Option<&str>,
    title: Option<&str>,
    json: bool,
) -> Result<(), CliError> {
    let mut notes = ctx.notes.records();

    if let Some(tag) = tag {
        let tag = resolve_tag(ctx, tag)?;
        notes.retain(|note| note.tag_ids.contains(&tag.id));
    }
    if let Some(title) = title {
        let needle = title.to_lowercase();
        notes.retain(|note| note.title.to_lowercase().contains(&needle));
    }

    if json {
        let items: Vec<_> = notes
            .iter()
            .map(|note| note_to_list_item(ctx, note))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes.");
        return Ok(());
    }
    for note in &notes {
        println!("{}", format_note_line(ctx, note));
    }
    Ok(())
}

pub fn show(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    println!("id:      {}", note.id);
    println!("status:  {}", sync_badge(&note));
    if let Some(server_id) = &note.server_id {
        println!("server:  {server_id}");
    }
    if let Some(permalink) = &note.permalink {
        println!("shared:  {permalink}");
    }
    let labels = tag_labels(ctx, &note);
    if !labels.is_empty() {
        println!("tags:    {}", labels.join(", "));
    }
    if let Some(updated_at) = &note.updated_at {
        println!("updated: {}", updated_at.to_rfc3339());
    }
    println!();
    println!("{}", note.title);
    if !note.markdown.is_empty() {
        println!();
        println!("{}", note.markdown);
    }
    Ok(())
}

pub fn edit(
    ctx: &AppContext,
    id: &str,
    title: Option<&str>,
    markdown: Option<&str>,
    tags: Option<&[String]>,
) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    if title.is_none() && markdown.is_none() && tags.is_none() {
        println!("Nothing to change.");
        return Ok(());
    }

    let tag_ids = match tags {
        Some(labels) => ensure_tags(ctx, labels)?,
        None => note.tag_ids.clone(),
    };
    let new_title = title.unwrap_or(&note.title);
    let new_markdown = markdown.unwrap_or(&note.markdown);

    let updated = ctx
        .notes
        .update_with(&note.id, |current| {
            current.with_edit(new_title, new_markdown, tag_ids.clone())
        })?;
    println!("Updated note {} ({})", updated.id, sync_badge(&updated));
    Ok(())
}

pub fn delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    ctx.notes.remove(&note.id)?;
    if note.is_on_server() {
        println!(
            "Deleted note {} locally. The server copy remains; run `keeper sync` to pull it back \
             or `keeper unlink` before deleting to remove it there.",
            note.id
        );
    } else {
        println!("Deleted note {}", note.id);
    }
    Ok(())
}
