//! Bundle retrieval pipeline.
//!
//! # Overview
//!
//! The orchestrator walks a [`Selection`] one bundle at a time. For each
//! bundle it tries the catalog's sources in declared order until one of them
//! retrieves the payload; a fault in any source is logged and the next one
//! is tried. Bundles whose sources all fail are recorded in the
//! [`RetrievalReport`] rather than aborting the run, so one unreachable host
//! never blocks the rest of the data.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use databundle_core::catalog::Catalog;
//! use databundle_core::fetch::{FetchContext, FetchOrchestrator};
//! use databundle_core::select;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::from_file("config/bundles.yaml")?;
//! let requested = vec!["MA".to_string(), "SN".to_string()];
//! let selection = select::select(&catalog, &requested, false, &BTreeMap::new());
//!
//! let ctx = FetchContext::new(".");
//! let report = FetchOrchestrator::new(&catalog, ctx).run(&selection).await;
//! println!("all bundles retrieved: {}", report.is_complete());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod extract;

pub use client::{HttpClient, RequestSpec};
pub use error::FetchError;
pub use extract::{extract_archive, extract_nested};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::catalog::{Bundle, Catalog};
use crate::select::Selection;

/// Basin subdivision level used when none is configured.
pub const DEFAULT_BASINS_LEVEL: u8 = 6;

/// Bundle id whose retrieval is followed by the basin merge step.
pub const HYDROBASINS_BUNDLE_ID: &str = "bundle_hydrobasins";

/// Shared state for one retrieval run.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Client used for every download in the run.
    pub client: HttpClient,
    /// Directory that bundle destinations and staging files resolve against.
    pub root: PathBuf,
    /// Subdivision level for the basins source.
    pub basins_level: u8,
    /// Whether to render per-download progress bars.
    pub show_progress: bool,
}

impl FetchContext {
    /// Creates a context rooted at `root` with default settings.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            client: HttpClient::new(),
            root: root.into(),
            basins_level: DEFAULT_BASINS_LEVEL,
            show_progress: true,
        }
    }

    /// Overrides the basin subdivision level.
    #[must_use]
    pub fn with_basins_level(mut self, level: u8) -> Self {
        self.basins_level = level;
        self
    }

    /// Enables or disables progress bars.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Resolves a bundle's destination directory against the run root.
    #[must_use]
    pub fn destination(&self, bundle: &Bundle) -> PathBuf {
        self.root.join(&bundle.destination)
    }
}

/// Post-retrieval hook that merges per-region basin shapefiles into one
/// world file.
///
/// Merging shapefile geometry needs a geospatial stack this crate does not
/// carry, so the orchestrator only defines the seam. Implementations receive
/// the basins destination directory and the subdivision level; the
/// conventional output name is [`crate::source::world_basin_name`].
pub trait BasinsMerger: Send + Sync {
    /// Merges the regional files found in `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when reading or writing the shapefiles fails.
    fn merge(&self, destination: &Path, level: u8) -> Result<(), FetchError>;
}

/// Outcome of one retrieval run, one flag per selected bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    results: BTreeMap<String, bool>,
}

impl RetrievalReport {
    fn record(&mut self, bundle: &str, downloaded: bool) {
        self.results.insert(bundle.to_string(), downloaded);
    }

    /// True when every selected bundle was retrieved.
    ///
    /// Vacuously true for an empty selection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.results.values().all(|downloaded| *downloaded)
    }

    /// Bundle ids that were retrieved, in id order.
    #[must_use]
    pub fn succeeded(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, downloaded)| **downloaded)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Bundle ids whose sources all failed, in id order.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, downloaded)| !**downloaded)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Iterates over (bundle id, downloaded) pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.results
            .iter()
            .map(|(name, downloaded)| (name.as_str(), *downloaded))
    }

    /// Number of bundles in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when no bundles were attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Drives retrieval of a selection against one catalog.
pub struct FetchOrchestrator<'a> {
    catalog: &'a Catalog,
    ctx: FetchContext,
    basins_merger: Option<Box<dyn BasinsMerger>>,
}

impl<'a> FetchOrchestrator<'a> {
    /// Creates an orchestrator without a basin merge hook.
    #[must_use]
    pub fn new(catalog: &'a Catalog, ctx: FetchContext) -> Self {
        Self {
            catalog,
            ctx,
            basins_merger: None,
        }
    }

    /// Installs the basin merge hook.
    #[must_use]
    pub fn with_basins_merger(mut self, merger: Box<dyn BasinsMerger>) -> Self {
        self.basins_merger = Some(merger);
        self
    }

    /// Retrieves every bundle in the selection, sequentially and in order.
    ///
    /// Failures are recorded in the report instead of propagated, so the
    /// caller always learns the fate of every bundle.
    #[instrument(skip_all, fields(bundles = selection.bundles.len()))]
    pub async fn run(&self, selection: &Selection) -> RetrievalReport {
        let mut report = RetrievalReport::default();

        for name in &selection.bundles {
            let downloaded = self.retrieve_bundle(name).await;
            if !downloaded {
                error!(bundle = %name, "bundle cannot be downloaded from any source");
            }
            report.record(name, downloaded);
        }

        self.merge_basins(selection);

        report
    }

    /// Tries the bundle's sources in declared order until one succeeds.
    async fn retrieve_bundle(&self, name: &str) -> bool {
        let Some(bundle) = self.catalog.get(name) else {
            warn!(bundle = %name, "selected bundle is not in the catalog");
            return false;
        };

        for source in &bundle.sources {
            info!(bundle = %name, host = source.kind(), "downloading bundle");
            match source.retrieve(bundle, &self.ctx).await {
                Ok(()) => {
                    info!(bundle = %name, host = source.kind(), "bundle downloaded");
                    return true;
                }
                Err(e) => {
                    warn!(
                        bundle = %name,
                        host = source.kind(),
                        error = %e,
                        "source attempt failed"
                    );
                }
            }
        }
        false
    }

    /// Runs the merge hook when the basins bundle is part of the selection.
    ///
    /// Membership in the selection is the trigger, not download success;
    /// regional files from an earlier run may still be worth merging.
    fn merge_basins(&self, selection: &Selection) {
        let Some(merger) = &self.basins_merger else {
            return;
        };
        if !selection.bundles.iter().any(|b| b == HYDROBASINS_BUNDLE_ID) {
            return;
        }
        let Some(bundle) = self.catalog.get(HYDROBASINS_BUNDLE_ID) else {
            return;
        };

        info!("merging regional basin files into a world file");
        if let Err(e) = merger.merge(&self.ctx.destination(bundle), self.ctx.basins_level) {
            error!(error = %e, "basin merge failed");
        }
    }
}
