//! CLI definitions using clap derive API
//!
//! Argument types live in one submodule per command:
//! - serve: Serve command arguments
//! - check: Check command arguments
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod check;
pub mod completions;
pub mod serve;

pub use check::CheckArgs;
pub use completions::CompletionsArgs;
pub use serve::ServeArgs;

/// Omphalos - broadcast graphics host
///
/// Loads graphics bundles and relays events between their panels, graphics and extensions.
#[derive(Parser, Debug)]
#[command(
    name = "omphalos",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Broadcast graphics host for stream overlays",
    long_about = "Omphalos discovers graphics bundles, resolves their dependencies, runs their \
                  extensions and serves their dashboard panels and broadcast graphics, relaying \
                  events between all of them over WebSockets.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  omphalos serve                    \x1b[90m# Load bundles and start the server\x1b[0m\n   \
                  omphalos serve --port 9090        \x1b[90m# Listen on another port\x1b[0m\n   \
                  omphalos check                    \x1b[90m# Show the load order without serving\x1b[0m\n   \
                  omphalos -r ./show check --strict \x1b[90m# Fail if any bundle would be skipped\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Root directory holding bundles/ and omphalos.yaml (defaults to current directory)
    #[arg(long, short = 'r', global = true, env = "OMPHALOS_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to <root>/omphalos.yaml)
    #[arg(long, short = 'c', global = true, env = "OMPHALOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load bundles and serve dashboard, graphics and relay
    Serve(ServeArgs),

    /// Validate bundles and print the load order
    Check(CheckArgs),

    /// Show version information
    #[command(hide = true)]
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
