pub mod auth_cmd;
pub mod common;
pub mod config_cmd;
pub mod notes;
pub mod share;
pub mod sync_cmd;
pub mod tags;
