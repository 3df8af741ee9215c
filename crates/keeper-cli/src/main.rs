//! Keeper CLI - local-first notes with optional account-based sync
//!
//! Everything works offline against a JSON store; signing in links the local
//! collections to a Keeper server account.

mod cli;
mod commands;
mod config;
mod context;
mod error;
mod session;

use clap::Parser;

use crate::cli::{Cli, Commands, ConfigCommands, TagCommands};
use crate::config::CliConfig;
use crate::context::AppContext;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keeper=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load()?;

    match cli.command {
        // Config commands run before any server or store wiring.
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show(&config, cli.server.as_deref(), cli.data_dir.as_deref())
            }
            ConfigCommands::SetServer { url } => commands::config_cmd::set_server(config, &url),
            ConfigCommands::SetDataDir { path } => commands::config_cmd::set_data_dir(config, path),
        },
        command => {
            let server_url = config.resolve_server(cli.server.as_deref());
            let data_dir = config.resolve_data_dir(cli.data_dir.as_deref())?;
            let ctx = AppContext::init(&server_url, &data_dir)?;
            dispatch(&ctx, command).await
        }
    }
}

async fn dispatch(ctx: &AppContext, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Add {
            title,
            markdown,
            tags,
        } => commands::notes::add(ctx, &title, &markdown, &tags),
        Commands::List { tag, title, json } => {
            commands::notes::list(ctx, tag.as_deref(), title.as_deref(), json)
        }
        Commands::Show { id } => commands::notes::show(ctx, &id),
        Commands::Edit {
            id,
            title,
            markdown,
            tags,
        } => commands::notes::edit(ctx, &id, title.as_deref(), markdown.as_deref(), tags.as_deref()),
        Commands::Delete { id } => commands::notes::delete(ctx, &id),
        Commands::Tags { command } => match command {
            TagCommands::List { json } => commands::tags::list(ctx, json),
            TagCommands::Rename { tag, label } => commands::tags::rename(ctx, &tag, &label),
            TagCommands::Delete { tag } => commands::tags::delete(ctx, &tag),
        },
        Commands::Sync => commands::sync_cmd::sync(ctx).await,
        Commands::SyncAll => commands::sync_cmd::sync_all(ctx).await,
        Commands::Push { id } => commands::sync_cmd::push(ctx, &id).await,
        Commands::Unlink { id } => commands::sync_cmd::unlink(ctx, &id).await,
        Commands::Share { id } => commands::share::share(ctx, &id).await,
        Commands::Revoke { id } => commands::share::revoke(ctx, &id).await,
        Commands::Shared { permalink } => commands::share::shared(ctx, &permalink).await,
        Commands::Login { username, password } => {
            commands::auth_cmd::login(ctx, &username, &password).await
        }
        Commands::Logout => commands::auth_cmd::logout(ctx).await,
        Commands::Whoami => commands::auth_cmd::whoami(ctx).await,
        Commands::Config { .. } => unreachable!("handled before context setup"),
    }
}
