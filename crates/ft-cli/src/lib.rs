//! Focus tracker CLI library.
//!
//! This crate provides the `ft` command line, the controller daemon and the
//! socket transport between them.

mod cli;
pub mod commands;
mod config;
pub mod daemon;
pub mod ipc;

pub use cli::{Cli, Commands};
pub use config::Config;
