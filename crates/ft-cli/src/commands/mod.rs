//! CLI subcommand implementations.

pub mod page;
pub mod session;
pub mod status;
