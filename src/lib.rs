//! Databundle Core Library
//!
//! This library provides the core functionality for the databundle tool,
//! which selects and retrieves country-scoped data bundles (shapes, rasters,
//! basin outlines) from a YAML catalog of mirrored download sources.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Bundle catalog loading and validation
//! - [`countries`] - Country code normalization and region expansion
//! - [`select`] - Coverage-driven bundle selection
//! - [`source`] - Per-host download sources
//! - [`fetch`] - Retrieval orchestration with per-bundle fallback

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod countries;
pub mod fetch;
pub mod select;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use catalog::{Bundle, Catalog, ConfigError};
pub use fetch::{
    BasinsMerger, DEFAULT_BASINS_LEVEL, FetchContext, FetchError, FetchOrchestrator,
    HYDROBASINS_BUNDLE_ID, HttpClient, RequestSpec, RetrievalReport,
};
pub use select::{MatchMap, MatchState, Selection};
pub use source::Source;
