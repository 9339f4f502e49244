//! Streaming HTTP client for bundle downloads.
//!
//! Wraps `reqwest` with the request shapes the catalog sources need: plain
//! GET, GET with extra headers, and POST with a form body. Responses are
//! streamed straight to disk so multi-gigabyte archives never sit in memory.
//!
//! # Example
//!
//! ```no_run
//! use databundle_core::fetch::{HttpClient, RequestSpec};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), databundle_core::fetch::FetchError> {
//! let client = HttpClient::new();
//! let spec = RequestSpec::get("https://example.com/bundle.zip");
//! let bytes = client.fetch_to_file(spec, Path::new("data/bundle.zip"), false).await?;
//! println!("downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::FetchError;

/// Time allowed for establishing a connection.
///
/// Total request time is deliberately unbounded: some bundles are tens of
/// gigabytes and take hours on slow links.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for streaming writes (64 KB).
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Parameters for one download request.
///
/// Borrowed so a [`crate::source::Source`] can hand out specs without
/// cloning its URL strings.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec<'a> {
    /// Target URL.
    pub url: &'a str,
    /// Extra request headers as (name, value) pairs.
    pub headers: &'a [(&'a str, &'a str)],
    /// Form body; `Some` switches the request from GET to POST.
    pub form: Option<&'a BTreeMap<String, String>>,
}

impl<'a> RequestSpec<'a> {
    /// Creates a plain GET request spec.
    #[must_use]
    pub fn get(url: &'a str) -> Self {
        Self {
            url,
            headers: &[],
            form: None,
        }
    }

    /// Attaches extra headers.
    #[must_use]
    pub fn with_headers(mut self, headers: &'a [(&'a str, &'a str)]) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches a form body, turning the request into a POST.
    #[must_use]
    pub fn with_form(mut self, form: &'a BTreeMap<String, String>) -> Self {
        self.form = Some(form);
        self
    }
}

/// HTTP client that streams responses to files.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Creates a new client with the default connect timeout.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized. This only happens
    /// with a broken build environment, so failing fast at startup is
    /// preferable to threading an unconstructible error through every caller.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(default_user_agent())
            .gzip(true)
            .build()
            .expect("failed to build HTTP client"); // Static config, safe to panic

        Self { client }
    }

    /// Downloads `spec` to `dest`, returning the number of bytes written.
    ///
    /// Any pre-existing file at `dest` is replaced. Parent directories are
    /// created as needed. On a mid-stream failure the partial file is
    /// removed so a later attempt starts clean.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URLs, network failures, timeouts,
    /// non-success HTTP statuses, and file system errors.
    #[instrument(skip(self, spec), fields(url = %spec.url))]
    pub async fn fetch_to_file(
        &self,
        spec: RequestSpec<'_>,
        dest: &Path,
        show_progress: bool,
    ) -> Result<u64, FetchError> {
        let url = Url::parse(spec.url).map_err(|_| FetchError::invalid_url(spec.url))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        // Stale files from interrupted runs would otherwise shadow the
        // fresh download when extraction later globs the destination.
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            debug!(path = %dest.display(), "removing pre-existing file");
            tokio::fs::remove_file(dest)
                .await
                .map_err(|e| FetchError::io(dest, e))?;
        }

        let response = self.send_request(&url, &spec).await?;
        let total_size = response.content_length();

        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let bar = progress_bar(show_progress, total_size, dest);
        let result = stream_to_file(response, file, dest, &bar).await;
        bar.finish_and_clear();

        match result {
            Ok(bytes_written) => {
                info!(
                    path = %dest.display(),
                    bytes = bytes_written,
                    "download complete"
                );
                Ok(bytes_written)
            }
            Err(e) => {
                // Leave no partial file behind.
                warn!(path = %dest.display(), "stream failed, removing partial file");
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    /// Sends the request and validates the response status.
    async fn send_request(
        &self,
        url: &Url,
        spec: &RequestSpec<'_>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = match spec.form {
            Some(form) => self.client.post(url.clone()).form(form),
            None => self.client.get(url.clone()),
        };
        for (name, value) in spec.headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url.as_str())
            } else {
                FetchError::network(url.as_str(), e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams the response body to the file, updating the progress bar.
async fn stream_to_file(
    response: reqwest::Response,
    file: File,
    dest: &Path,
    bar: &ProgressBar,
) -> Result<u64, FetchError> {
    let url = response.url().as_str().to_string();
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(&url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        bytes_written += chunk.len() as u64;
        bar.inc(chunk.len() as u64);
    }

    writer.flush().await.map_err(|e| FetchError::io(dest, e))?;

    Ok(bytes_written)
}

/// Builds the per-download progress bar.
///
/// Hidden bars keep the call sites branch-free when progress output is
/// disabled or the process has no terminal.
fn progress_bar(show: bool, total_size: Option<u64>, dest: &Path) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let bar = match total_size {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg:20!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{msg:20!} {spinner} {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        }
    };

    let name = dest
        .file_name()
        .map_or_else(|| dest.display().to_string(), |n| n.to_string_lossy().into_owned());
    bar.set_message(name);
    bar
}

/// User agent sent with every request unless a source overrides it.
fn default_user_agent() -> String {
    format!("databundle/{}", env!("CARGO_PKG_VERSION"))
}
