//! Account commands. Sign-in and sign-out both end with a reconciliation run
//! so local data immediately reflects the new identity.

use crate::context::AppContext;
use crate::error::CliError;

pub async fn login(ctx: &AppContext, username: &str, password: &str) -> Result<(), CliError> {
    let session = ctx.auth.sign_in(&ctx.auth_state, username, password).await?;
    // The sync engines hold clones of the shared client; the fresh token has
    // to land there before the post-login pull, not just in the keyring.
    ctx.client.set_token(Some(session.token.clone()));
    println!(
        "Signed in as {} ({})",
        session.user.name, session.user.username
    );

    let notes = ctx.notes.reconcile_from_server().await;
    let tags = ctx.tags.reconcile_from_server().await;
    println!("Pulled {} notes and {} tags.", notes.len(), tags.len());
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<(), CliError> {
    // Local sign-out always succeeds; a server-side failure only means the
    // token was not invalidated remotely.
    if let Err(error) = ctx.auth.sign_out(&ctx.auth_state).await {
        tracing::warn!(%error, "server sign-out failed; local session cleared anyway");
    }
    ctx.client.set_token(None);

    let notes = ctx.notes.reconcile_from_server().await;
    let tags = ctx.tags.reconcile_from_server().await;
    println!(
        "Signed out. Kept {} notes and {} tags locally, unlinked from the server.",
        notes.len(),
        tags.len()
    );
    Ok(())
}

pub async fn whoami(ctx: &AppContext) -> Result<(), CliError> {
    let identity = ctx.auth.check_session(&ctx.auth_state).await?;
    match identity.user() {
        Some(user) => {
            println!("Signed in as {} ({})", user.name, user.username);
            if !user.email.is_empty() {
                println!("Email: {}", user.email);
            }
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
