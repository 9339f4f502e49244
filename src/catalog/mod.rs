//! Bundle catalog model and loader.
//!
//! A catalog maps bundle names to [`Bundle`] records: which countries a bundle
//! covers, which category of data it carries, where it unpacks, and the
//! ordered list of sources it can be fetched from. Catalogs are declared in
//! YAML under a top-level `databundles` section.
//!
//! # Example
//!
//! ```no_run
//! use databundle_core::catalog::Catalog;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::from_file("bundles.yaml")?;
//! for (name, bundle) in catalog.iter() {
//!     println!("{name}: {} countries", bundle.countries.len());
//! }
//! # Ok(())
//! # }
//! ```

mod error;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use error::ConfigError;

use crate::countries;
use crate::source::Source;

/// One named, downloadable, country-scoped data package.
///
/// Records are read-only after load; per-run match state lives in a separate
/// map computed by the selection module.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Country codes this bundle supplies data for (normalized, no duplicates).
    pub countries: Vec<String>,
    /// Coarse data-type grouping used to partition selection (opaque tag).
    pub category: String,
    /// Whether this is a small demo-sized bundle for tutorial runs.
    pub tutorial: bool,
    /// Extraction directory, relative to the run's destination root.
    pub destination: PathBuf,
    /// Alternative providers in fallback priority order (never empty).
    pub sources: Vec<Source>,
    /// Declared output path patterns.
    pub outputs: Vec<String>,
    /// Option name to suppressed outputs; the literal "all" disables the
    /// whole bundle while that option is active.
    pub disable_by_opt: BTreeMap<String, Vec<String>>,
    /// Whether direct/post downloads are archives to extract in place.
    pub unzip: bool,
}

/// Raw catalog entry as written in YAML, before normalization.
#[derive(Debug, Deserialize)]
struct RawBundle {
    countries: Vec<String>,
    category: String,
    #[serde(default)]
    tutorial: bool,
    destination: PathBuf,
    urls: serde_yaml::Mapping,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    disable_by_opt: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    unzip: bool,
}

/// An immutable, name-keyed collection of bundles.
///
/// Backed by a `BTreeMap` so every iteration over the catalog is sorted by
/// bundle name; selection depends on that determinism.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    bundles: BTreeMap<String, Bundle>,
}

impl Catalog {
    /// Loads a catalog from a YAML file with a top-level `databundles` section.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Parses a catalog from YAML text with a top-level `databundles` section.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        match document.get("databundles") {
            Some(serde_yaml::Value::Mapping(mapping)) => Self::from_mapping(mapping.clone()),
            _ => Err(ConfigError::MissingSection),
        }
    }

    /// Builds a catalog from an already-parsed name-to-fields mapping.
    pub fn from_mapping(mapping: serde_yaml::Mapping) -> Result<Self, ConfigError> {
        let mut bundles = BTreeMap::new();
        for (key, value) in &mapping {
            let name = key
                .as_str()
                .ok_or_else(|| ConfigError::invalid_bundle("?", "bundle names must be strings"))?;
            let raw: RawBundle = serde_yaml::from_value(value.clone())
                .map_err(|e| ConfigError::invalid_bundle(name, e.to_string()))?;
            let bundle = build_bundle(name, raw)?;
            bundles.insert(name.to_string(), bundle);
        }
        Ok(Self { bundles })
    }

    /// Looks up a bundle by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Bundle> {
        self.bundles.get(name)
    }

    /// Iterates bundles in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bundle)> {
        self.bundles.iter()
    }

    /// Number of bundles in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether the catalog has no bundles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// The distinct category tags present, in sorted order.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<String> {
        self.bundles
            .values()
            .map(|bundle| bundle.category.clone())
            .collect()
    }

    /// Declared output patterns for the given bundle names, deduplicated and
    /// sorted.
    ///
    /// Wildcard patterns are skipped unless they denote a directory (trailing
    /// slash); names absent from the catalog contribute nothing.
    #[must_use]
    pub fn expected_outputs(&self, selected: &[String]) -> Vec<String> {
        let mut outputs: BTreeSet<String> = BTreeSet::new();
        for name in selected {
            let Some(bundle) = self.bundles.get(name) else {
                continue;
            };
            for pattern in &bundle.outputs {
                if !pattern.contains('*') || pattern.ends_with('/') {
                    outputs.insert(pattern.clone());
                }
            }
        }
        outputs.into_iter().collect()
    }
}

/// Converts a raw YAML entry into a normalized [`Bundle`].
///
/// Country tokens are expanded through [`countries::normalize`]; the `urls`
/// mapping becomes a [`Source`] list preserving YAML declaration order, which
/// is the fallback priority.
fn build_bundle(name: &str, raw: RawBundle) -> Result<Bundle, ConfigError> {
    let suffixes = hydrobasins_suffixes(name, &raw.urls)?;
    let mut sources = Vec::new();
    for (key, value) in &raw.urls {
        let kind = key.as_str().ok_or_else(|| {
            ConfigError::invalid_bundle(name, "source kinds must be strings")
        })?;
        if kind == "suffixes" {
            continue;
        }
        sources.push(source_from_entry(name, kind, value, suffixes.as_deref())?);
    }
    if sources.is_empty() {
        return Err(ConfigError::invalid_bundle(name, "no sources declared"));
    }
    Ok(Bundle {
        countries: countries::normalize(&raw.countries),
        category: raw.category,
        tutorial: raw.tutorial,
        destination: raw.destination,
        sources,
        outputs: raw.output,
        disable_by_opt: raw.disable_by_opt,
        unzip: raw.unzip,
    })
}

/// Reads the optional `suffixes` list that feeds the hydrobasins source kind.
fn hydrobasins_suffixes(
    name: &str,
    urls: &serde_yaml::Mapping,
) -> Result<Option<Vec<String>>, ConfigError> {
    match urls.get(serde_yaml::Value::String("suffixes".to_string())) {
        None => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|_| {
                ConfigError::invalid_bundle(name, "'suffixes' must be a list of region codes")
            }),
    }
}

fn source_from_entry(
    name: &str,
    kind: &str,
    value: &serde_yaml::Value,
    suffixes: Option<&[String]>,
) -> Result<Source, ConfigError> {
    match kind {
        "zenodo" => Ok(Source::Zenodo {
            url: url_string(name, kind, value)?,
        }),
        "gdrive" => Ok(Source::GDrive {
            url: url_string(name, kind, value)?,
        }),
        "protectedplanet" => Ok(Source::ProtectedPlanet {
            url: url_string(name, kind, value)?,
        }),
        "direct" => Ok(Source::Direct {
            url: url_string(name, kind, value)?,
        }),
        "post" => post_source(name, value),
        "hydrobasins" => {
            let suffixes = suffixes.unwrap_or_default();
            if suffixes.is_empty() {
                return Err(ConfigError::invalid_bundle(
                    name,
                    "hydrobasins source requires a non-empty 'suffixes' list",
                ));
            }
            Ok(Source::Hydrobasins {
                url_template: url_string(name, kind, value)?,
                suffixes: suffixes.to_vec(),
            })
        }
        other => Err(ConfigError::invalid_bundle(
            name,
            format!("unknown source kind '{other}'"),
        )),
    }
}

/// The `post` entry is a mapping whose `url` key is the endpoint; every other
/// key/value pair becomes part of the form body.
fn post_source(name: &str, value: &serde_yaml::Value) -> Result<Source, ConfigError> {
    let mapping = value.as_mapping().ok_or_else(|| {
        ConfigError::invalid_bundle(name, "'post' source must be a mapping with a 'url' key")
    })?;
    let mut url = None;
    let mut body = BTreeMap::new();
    for (key, value) in mapping {
        let field = key.as_str().ok_or_else(|| {
            ConfigError::invalid_bundle(name, "'post' source fields must be strings")
        })?;
        let text = scalar_string(value).ok_or_else(|| {
            ConfigError::invalid_bundle(
                name,
                format!("'post' source field '{field}' must be a scalar"),
            )
        })?;
        if field == "url" {
            url = Some(text);
        } else {
            body.insert(field.to_string(), text);
        }
    }
    let url = url.ok_or_else(|| {
        ConfigError::invalid_bundle(name, "'post' source is missing the 'url' field")
    })?;
    Ok(Source::Post { url, body })
}

fn url_string(name: &str, kind: &str, value: &serde_yaml::Value) -> Result<String, ConfigError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ConfigError::invalid_bundle(name, format!("'{kind}' source must be a URL string"))
    })
}

/// Renders scalar YAML values (strings, numbers, booleans) as strings for
/// form bodies.
fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
