//! Public share-link commands.

use keeper_core::Error;

use crate::commands::common::resolve_note;
use crate::context::AppContext;
use crate::error::CliError;

pub async fn share(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    let permalink = ctx.notes.share(&note.id).await?;
    println!("Share link created: {permalink}");
    println!("Anyone can read it with: keeper shared {permalink}");
    Ok(())
}

pub async fn revoke(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    ctx.notes.revoke_share(&note.id).await?;
    println!("Share link revoked for note {}", note.id);
    Ok(())
}

/// Read a note through its public link. A dead link is reported as a
/// placeholder rather than an error, matching the shared-page behavior.
pub async fn shared(ctx: &AppContext, permalink: &str) -> Result<(), CliError> {
    match ctx.client.fetch_shared_note(permalink).await {
        Ok(note) => {
            println!("{}", note.title);
            if !note.markdown.is_empty() {
                println!();
                println!("{}", note.markdown);
            }
            Ok(())
        }
        Err(Error::NotFound(_)) => {
            println!("Note not found");
            println!();
            println!("This note does not exist or its share link was revoked.");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
