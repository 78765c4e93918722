//! Log output setup
//!
//! `RUST_LOG` takes precedence; otherwise `--verbose` selects `debug` and the
//! configured level applies. Logs go to stderr so command output on stdout
//! stays clean.

use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is not set
pub fn default_directive(level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        level.to_string()
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level, verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
