//! Error types for catalog loading.
//!
//! Catalog problems are fatal: a run cannot select or retrieve anything from
//! a catalog it could not read, so these errors propagate to the caller
//! instead of being recovered.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a bundle catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The catalog file could not be read.
    #[error("cannot read catalog file {path}: {source}")]
    Io {
        /// The file path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid YAML.
    #[error("malformed catalog YAML: {source}")]
    Yaml {
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The catalog document has no `databundles` mapping.
    #[error("catalog has no 'databundles' section")]
    MissingSection,

    /// A bundle entry is structurally invalid.
    #[error("bundle '{bundle}': {reason}")]
    InvalidBundle {
        /// The offending bundle name.
        bundle: String,
        /// What is wrong with the entry.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an IO error for a catalog path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-bundle error.
    pub fn invalid_bundle(bundle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBundle {
            bundle: bundle.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Yaml { source }
    }
}
