use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] keeper_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("Tag not found: {0}")]
    TagNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Not signed in. Run `keeper login <username> <password>` first.")]
    NotSignedIn,
}
