//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use databundle_core::DEFAULT_BASINS_LEVEL;

/// Retrieve country-scoped data bundles from their upstream hosts.
///
/// Databundle reads a bundle catalog, picks the smallest set of bundles that
/// covers the requested countries, and downloads each one, falling back
/// between mirrors until the data lands in its destination directory.
#[derive(Parser, Debug)]
#[command(name = "databundle")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the bundle catalog YAML (top-level `databundles:` section)
    #[arg(short = 'b', long, value_name = "FILE")]
    pub bundles: PathBuf,

    /// Country or region codes to retrieve data for (comma-separated)
    #[arg(
        short = 'c',
        long,
        required = true,
        value_delimiter = ',',
        value_name = "CODES"
    )]
    pub countries: Vec<String>,

    /// Select tutorial-sized bundles instead of full-size ones
    #[arg(short = 't', long)]
    pub tutorial: bool,

    /// Option names treated as active when evaluating bundle exclusions (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "OPTIONS")]
    pub enable: Vec<String>,

    /// Directory that bundle destinations resolve against
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Basin subdivision level (1-12)
    #[arg(long, default_value_t = DEFAULT_BASINS_LEVEL, value_parser = clap::value_parser!(u8).range(1..=12))]
    pub basins_level: u8,

    /// Disable download progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Print the selection and expected outputs without downloading
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero when any selected bundle could not be retrieved
    #[arg(long)]
    pub strict: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
