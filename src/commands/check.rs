//! Check command implementation
//!
//! Runs discovery, resolution and planning without loading anything and
//! prints the load order together with every bundle that would be skipped.

use std::path::PathBuf;

use console::Style;

use super::helpers::Context;
use crate::cli::CheckArgs;
use crate::config::Overrides;
use crate::discovery::{DiscoveryReport, Rejection, discover};
use crate::error::{Result, config_invalid};
use crate::resolver::{Resolution, plan, resolve};

/// Run check command
pub fn run(root: Option<PathBuf>, config: Option<PathBuf>, args: CheckArgs) -> Result<()> {
    let ctx = Context::load(root, config.as_deref(), &Overrides::default())?;
    let DiscoveryReport { accepted, rejected } = discover(&ctx.discovery_options()?);
    let resolution = resolve(accepted);

    print_load_order(&resolution)?;
    print_skipped(&rejected, &resolution);

    let skipped = rejected.len() + resolution.excluded.len();
    if args.strict && skipped > 0 {
        return Err(config_invalid(format!("{skipped} bundle(s) would not be loaded")));
    }
    Ok(())
}

fn print_load_order(resolution: &Resolution) -> Result<()> {
    let order = plan(&resolution.graph)?;
    if order.is_empty() {
        println!("No bundles to load.");
        return Ok(());
    }

    println!("Load order ({}):", order.len());
    for (position, index) in order.iter().enumerate() {
        let Some(node) = resolution.graph.node(index) else {
            continue;
        };
        let manifest = &node.manifest;
        println!(
            "  {}. {} {}",
            position + 1,
            Style::new().bold().yellow().apply_to(&manifest.name),
            Style::new().dim().apply_to(&manifest.version)
        );
        for dep in manifest.dependencies.keys() {
            println!(
                "       {} {}",
                Style::new().dim().apply_to("needs"),
                Style::new().cyan().apply_to(dep)
            );
        }
    }
    Ok(())
}

fn print_skipped(rejections: &[Rejection], resolution: &Resolution) {
    if rejections.is_empty() && resolution.excluded.is_empty() {
        return;
    }

    println!();
    println!("Skipped ({}):", rejections.len() + resolution.excluded.len());
    for rejection in rejections {
        let label = rejection
            .name
            .clone()
            .unwrap_or_else(|| rejection.location.display().to_string());
        println!("  {} {}", Style::new().bold().red().apply_to(label), rejection.error);
    }
    for exclusion in &resolution.excluded {
        println!(
            "  {} {}",
            Style::new().bold().red().apply_to(&exclusion.manifest.name),
            exclusion.error
        );
    }
}
