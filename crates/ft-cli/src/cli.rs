//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ft_core::SessionKind;

/// Focus and relax session tracker.
///
/// Tracks focus and relax time, and freezes the focus timer when no activity
/// is reported for a while.
#[derive(Debug, Parser)]
#[command(name = "ft", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the session controller in the foreground.
    Daemon,

    /// Start focus, or pause it if it is running.
    Focus,

    /// Start relax, or pause it if it is running.
    Relax,

    /// Zero one timer.
    Reset {
        /// Which timer to reset (focus or relax).
        kind: SessionKind,
    },

    /// Show both timers.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Keep refreshing until interrupted.
        #[arg(long)]
        watch: bool,
    },

    /// Attach a page context that reports input events read from stdin.
    ///
    /// One event per line, e.g. `mousemove`, `click`, `keydown input`.
    Page {
        /// URL of the page. Only http(s) pages are monitored.
        #[arg(long)]
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reset_kind() {
        let cli = Cli::try_parse_from(["ft", "reset", "relax"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Reset {
                kind: SessionKind::Relax
            })
        ));
    }

    #[test]
    fn rejects_unknown_reset_kind() {
        assert!(Cli::try_parse_from(["ft", "reset", "nap"]).is_err());
    }

    #[test]
    fn status_flags() {
        let cli = Cli::try_parse_from(["ft", "-v", "status", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                json: true,
                watch: false
            })
        ));
    }
}
