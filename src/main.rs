//! Omphalos - broadcast graphics host
//!
//! Discovers graphics bundles, resolves their dependencies, runs their server
//! side extensions and serves their dashboard panels and broadcast graphics,
//! relaying events between all of them over WebSockets.

use clap::Parser;

mod cli;
mod commands;
mod config;
mod discovery;
mod error;
mod loader;
mod logging;
mod manifest;
mod path_utils;
mod relay;
mod resolver;
mod server;

#[cfg(test)]
mod test_fixtures;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve(_)) {
        logging::init("warn", cli.verbose);
    }

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(cli.root, cli.config, cli.verbose, args).await,
        Commands::Check(args) => commands::check::run(cli.root, cli.config, args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
