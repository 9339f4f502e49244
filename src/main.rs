//! CLI entry point for the databundle tool.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use clap::Parser;
use databundle_core::{
    countries, select, Catalog, FetchContext, FetchOrchestrator, HYDROBASINS_BUNDLE_ID,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let catalog = Catalog::from_file(&args.bundles)?;
    info!(
        catalog = %args.bundles.display(),
        bundles = catalog.len(),
        "bundle catalog loaded"
    );

    let requested = countries::normalize(&args.countries);
    info!(countries = requested.len(), "retrieving data");

    warn!(
        "the retrieved datasets come under their own licenses; \
         downloading them implies acceptance of those terms"
    );

    let active_options: BTreeMap<String, bool> = args
        .enable
        .iter()
        .map(|option| (option.clone(), true))
        .collect();

    let selection = select::select(&catalog, &requested, args.tutorial, &active_options);
    info!(bundles = ?selection.bundles, "bundles selected");

    if args.dry_run {
        info!("dry run, nothing will be downloaded");
        for bundle in &selection.bundles {
            println!("bundle {bundle}");
        }
        for output in catalog.expected_outputs(&selection.bundles) {
            println!("output {output}");
        }
        return Ok(());
    }

    let ctx = FetchContext::new(&args.root)
        .with_basins_level(args.basins_level)
        .with_progress(!args.no_progress && !args.quiet);

    let report = FetchOrchestrator::new(&catalog, ctx).run(&selection).await;

    if selection.bundles.iter().any(|b| b == HYDROBASINS_BUNDLE_ID) {
        // No merge hook is wired in: combining the regional shapefiles
        // into a world file needs a geometry stack, so it stays downstream.
        info!("regional basin files are kept separate");
    }

    info!(
        succeeded = report.succeeded().len(),
        failed = report.failed().len(),
        total = report.len(),
        "retrieval finished"
    );

    if args.strict && !report.is_complete() {
        bail!(
            "{} of {} bundles could not be retrieved",
            report.failed().len(),
            report.len()
        );
    }

    Ok(())
}
