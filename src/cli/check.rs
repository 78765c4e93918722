use clap::Parser;

/// Arguments for the check command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show the load order:\n    omphalos check\n\n\
                  Fail when a bundle would be skipped (CI):\n    omphalos check --strict")]
pub struct CheckArgs {
    /// Exit with an error if any bundle is rejected or excluded
    #[arg(long)]
    pub strict: bool,
}
