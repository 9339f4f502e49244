//! Error types for retrieval and extraction.
//!
//! Every variant describes one failed source attempt. The orchestrator
//! recovers from all of them by falling back to the bundle's next source, so
//! these errors carry context for the warning logs rather than for
//! propagation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching or unpacking one source attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// broken stream).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while staging or writing a download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A source descriptor cannot be turned into retrievable parameters.
    #[error("cannot resolve source {url}: {reason}")]
    SourceResolution {
        /// The descriptor URL that failed to resolve.
        url: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A downloaded archive could not be opened or unpacked.
    #[error("cannot extract archive {path}: {source}")]
    Extract {
        /// The archive path that failed.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a source-resolution error.
    pub fn source_resolution(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceResolution {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an extraction error.
    pub fn extract(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Extract {
            path: path.into(),
            source,
        }
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>` impls: the variants
// need context (url, path) the source errors do not carry, so callers go
// through the constructor helpers instead.
