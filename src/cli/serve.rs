use clap::Parser;

/// Arguments for the serve command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Serve the current directory:\n    omphalos serve\n\n\
                  Serve on another port:\n    omphalos serve --port 9090\n\n\
                  Trace relay traffic:\n    omphalos serve --log-level trace")]
pub struct ServeArgs {
    /// Port to listen on (overrides the configuration file)
    #[arg(long, short = 'p', env = "PORT")]
    pub port: Option<u16>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}
