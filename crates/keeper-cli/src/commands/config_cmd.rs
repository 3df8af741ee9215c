//! Configuration commands.

use std::path::{Path, PathBuf};

use crate::config::CliConfig;
use crate::error::CliError;

pub fn show(config: &CliConfig, server: Option<&str>, data_dir: Option<&Path>) -> Result<(), CliError> {
    println!("server:   {}", config.resolve_server(server));
    println!("data dir: {}", config.resolve_data_dir(data_dir)?.display());
    Ok(())
}

pub fn set_server(mut config: CliConfig, url: &str) -> Result<(), CliError> {
    config.server_url = Some(url.to_string());
    let path = config.save()?;
    println!("Saved server URL to {}", path.display());
    Ok(())
}

pub fn set_data_dir(mut config: CliConfig, dir: PathBuf) -> Result<(), CliError> {
    config.data_dir = Some(dir);
    let path = config.save()?;
    println!("Saved data directory to {}", path.display());
    Ok(())
}
