//! Serve command implementation
//!
//! ```text
//! config ─► discover ─► resolve ─► load (extensions run) ─► router ─► listen
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::helpers::Context;
use crate::cli::ServeArgs;
use crate::config::Overrides;
use crate::discovery::discover;
use crate::error::Result;
use crate::loader::{BundleLoader, ProcessLoader};
use crate::logging;
use crate::relay::Relay;
use crate::resolver::resolve;
use crate::server::{self, AppState, Catalog, FailedBundle};

/// Run serve command
pub async fn run(
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: bool,
    args: ServeArgs,
) -> Result<()> {
    let overrides = Overrides {
        port: args.port,
        log_level: args.log_level,
    };
    let ctx = Context::load(root, config.as_deref(), &overrides)?;
    logging::init(&ctx.config.logging.level, verbose);
    let addr = ctx.config.socket_addr()?;

    let discovery = discover(&ctx.discovery_options()?);
    tracing::info!(
        accepted = discovery.accepted.len(),
        rejected = discovery.rejected.len(),
        "Discovered bundles"
    );
    let resolution = resolve(discovery.accepted);
    if resolution.graph.is_empty() {
        tracing::warn!("No bundles to load");
    }

    let relay = Relay::new();
    let loader = BundleLoader::new(
        Arc::new(ProcessLoader::new(env!("CARGO_PKG_VERSION"))),
        relay.clone(),
        Duration::from_secs(ctx.config.bundles.load_timeout_secs),
    );
    let report = loader.load_all(&resolution.graph).await?;
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len() + resolution.excluded.len(),
        "Bundles ready"
    );

    let failed = discovery
        .rejected
        .into_iter()
        .map(FailedBundle::from)
        .chain(resolution.excluded.into_iter().map(FailedBundle::from))
        .chain(report.failed.into_iter().map(FailedBundle::from));
    let state = AppState {
        relay,
        catalog: Arc::new(Catalog::new(report.loaded).with_failures(failed)),
    };
    let app = server::router(state, &ctx.config.static_dir(&ctx.root));
    server::serve(addr, app).await
}
