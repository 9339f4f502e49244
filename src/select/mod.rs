//! Bundle selection: coverage matching, option gating, and the per-category
//! greedy cover.
//!
//! # Overview
//!
//! Selection runs once per catalog load. [`annotate`] computes, per bundle,
//! the intersection between the bundle's countries and the requested list.
//! [`select`] then walks every category in sorted order and greedily picks
//! bundles until the requested countries are covered or candidates run out.
//!
//! Candidates sort ascending by match count, so the least-covering bundle is
//! picked first and wider bundles fill the gaps. That order looks backwards
//! but downstream data layouts rely on it; changing it changes which bundles
//! land on disk. Ties break on bundle name so repeated runs produce identical
//! selections.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::catalog::{Bundle, Catalog};

/// Per-bundle, per-run coverage annotation.
///
/// Derived from the catalog and the requested country list; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchState {
    /// Requested countries this bundle supplies data for.
    pub matched_countries: BTreeSet<String>,
}

impl MatchState {
    /// Number of requested countries the bundle covers.
    #[must_use]
    pub fn n_matched(&self) -> usize {
        self.matched_countries.len()
    }
}

/// Bundle name to [`MatchState`] for one run.
pub type MatchMap = BTreeMap<String, MatchState>;

/// Computes the coverage annotation for every bundle in the catalog.
///
/// Pure: no I/O, no catalog mutation, and idempotent for a fixed requested
/// list. `requested` is expected to hold canonical country codes (see
/// [`crate::countries::normalize`]).
#[must_use]
pub fn annotate(catalog: &Catalog, requested: &[String]) -> MatchMap {
    let requested_set: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    catalog
        .iter()
        .map(|(name, bundle)| {
            let matched_countries = bundle
                .countries
                .iter()
                .filter(|country| requested_set.contains(country.as_str()))
                .cloned()
                .collect();
            (name.clone(), MatchState { matched_countries })
        })
        .collect()
}

/// Whether the active options disable this bundle outright.
///
/// Unions the disabled-output lists of every active option named in the
/// bundle's `disable_by_opt`; the sentinel `"all"` anywhere in that union
/// disables the bundle. A bundle with no `disable_by_opt` entries is never
/// disabled. Partial output lists do not affect selection.
#[must_use]
pub fn is_fully_disabled(bundle: &Bundle, active_options: &BTreeMap<String, bool>) -> bool {
    let mut disabled: BTreeSet<&str> = BTreeSet::new();
    for (option, outputs) in &bundle.disable_by_opt {
        if active_options.get(option).copied().unwrap_or(false) {
            disabled.extend(outputs.iter().map(String::as_str));
        }
    }
    disabled.contains("all")
}

/// Ordered outcome of one selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Bundle names to download, category by category.
    pub bundles: Vec<String>,
    /// Categories that needed more than one bundle for coverage. Non-fatal,
    /// surfaced so callers can see overlapping coverage without scraping
    /// logs.
    pub overlapping_categories: Vec<String>,
}

impl Selection {
    /// Whether nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Number of selected bundles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }
}

/// Picks the bundle set covering the requested countries.
///
/// Categories are visited in sorted order; within each category candidates
/// must match the tutorial flag exactly and pass the option gate. An empty
/// requested list yields an empty selection, which is a valid outcome and not
/// an error.
#[must_use]
pub fn select(
    catalog: &Catalog,
    requested: &[String],
    tutorial: bool,
    active_options: &BTreeMap<String, bool>,
) -> Selection {
    let matches = annotate(catalog, requested);
    let mut selection = Selection::default();
    for category in catalog.categories() {
        let picked =
            select_for_category(catalog, &matches, &category, requested, tutorial, active_options);
        if picked.is_empty() {
            debug!(category = %category, "no candidate bundles for category");
            continue;
        }
        if picked.len() > 1 {
            warn!(
                category = %category,
                bundles = ?picked,
                "multiple bundles needed to cover one category"
            );
            selection.overlapping_categories.push(category.clone());
        }
        selection.bundles.extend(picked);
    }
    selection
}

/// The per-category greedy cover.
///
/// Candidates sort ascending by `n_matched` with a lexicographic name
/// tie-break; each candidate whose matched countries still intersect the
/// remaining set is appended and its intersection removed. Candidates with an
/// empty intersection are skipped, not terminal: a later, wider candidate may
/// still cover what is left.
fn select_for_category(
    catalog: &Catalog,
    matches: &MatchMap,
    category: &str,
    requested: &[String],
    tutorial: bool,
    active_options: &BTreeMap<String, bool>,
) -> Vec<String> {
    let mut candidates: Vec<&String> = catalog
        .iter()
        .filter(|(_, bundle)| {
            bundle.category == category
                && bundle.tutorial == tutorial
                && !is_fully_disabled(bundle, active_options)
        })
        .map(|(name, _)| name)
        .collect();
    candidates.sort_by(|a, b| {
        let n_a = matches.get(*a).map_or(0, MatchState::n_matched);
        let n_b = matches.get(*b).map_or(0, MatchState::n_matched);
        n_a.cmp(&n_b).then_with(|| a.cmp(b))
    });

    let mut remaining: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    let mut picked = Vec::new();
    for name in candidates {
        let Some(state) = matches.get(name) else {
            continue;
        };
        let intersect: Vec<&str> = state
            .matched_countries
            .iter()
            .map(String::as_str)
            .filter(|country| remaining.contains(*country))
            .collect();
        if intersect.is_empty() {
            continue;
        }
        for country in intersect {
            remaining.remove(country);
        }
        picked.push(name.clone());
    }
    picked
}
