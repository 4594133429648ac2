//! CLI over the CalDAV session: configuration, secrets, commands
//!
//! This crate provides the `davcal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
