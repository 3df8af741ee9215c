//! Server synchronization commands.

use crate::commands::common::{resolve_note, sync_badge};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn sync(ctx: &AppContext) -> Result<(), CliError> {
    let notes = ctx.notes.reconcile_from_server().await;
    let tags = ctx.tags.reconcile_from_server().await;

    if ctx.auth_state.identity().is_authenticated() {
        println!(
            "Reconciled with the server: {} notes, {} tags.",
            notes.len(),
            tags.len()
        );
    } else {
        println!(
            "Not signed in; cleared server linkage from {} notes and {} tags.",
            notes.len(),
            tags.len()
        );
    }
    Ok(())
}

pub async fn sync_all(ctx: &AppContext) -> Result<(), CliError> {
    ctx.require_user_id()?;
    let notes = ctx.notes.sync_all().await?;
    let tags = ctx.tags.sync_all().await?;
    println!(
        "Pushed and reconciled everything: {} notes, {} tags.",
        notes.len(),
        tags.len()
    );
    Ok(())
}

pub async fn push(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    let pushed = ctx.notes.sync_one(&note.id).await?;
    println!("Pushed note {} ({})", pushed.id, sync_badge(&pushed));
    Ok(())
}

pub async fn unlink(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let note = resolve_note(ctx, id)?;
    let detached = ctx.notes.delete_synced(&note.id).await?;
    println!(
        "Removed note {} from the server; the local copy is kept ({}).",
        detached.id,
        sync_badge(&detached)
    );
    Ok(())
}
