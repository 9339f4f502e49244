//! Download sources for catalog bundles.
//!
//! # Overview
//!
//! Every bundle lists one or more sources, each naming a host kind and the
//! parameters needed to fetch from it. The set of kinds is closed: a catalog
//! entry either parses into one of the [`Source`] variants or is rejected at
//! load time, so retrieval never has to look up handlers by name.
//!
//! All variants share the same contract: [`Source::retrieve`] downloads the
//! bundle's payload into its destination directory, unpacking archives where
//! the host's packaging calls for it, and reports any fault as a
//! [`FetchError`] for the orchestrator to fall back on.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument};

use crate::catalog::Bundle;
use crate::fetch::{extract_archive, extract_nested, FetchContext, FetchError, RequestSpec};

/// Staging file name for whole-bundle archives downloaded to the run root.
const STAGING_ARCHIVE: &str = "tempfile.zip";

/// Staging file name for the protected-areas registry download.
const STAGING_PROTECTED_ARCHIVE: &str = "tempfile_wpda.zip";

/// The basins host rejects requests without a browser-like user agent.
const BROWSER_HEADERS: &[(&str, &str)] = &[("User-agent", "Mozilla/5.0")];

/// Splits a share link at the `/view` suffix that follows the file id.
#[allow(clippy::expect_used)]
static VIEW_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/view|\\view").expect("view split pattern is valid") // Static pattern, safe to panic
});

/// Splits a path on forward or backward slashes.
#[allow(clippy::expect_used)]
static SEPARATOR_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\\/]").expect("separator pattern is valid") // Static pattern, safe to panic
});

/// One way to obtain a bundle's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Research-archive record serving one zip of the whole bundle.
    Zenodo {
        /// Direct download URL of the record's archive.
        url: String,
    },
    /// Cloud-drive share link; the file id is embedded in the link.
    GDrive {
        /// Share link in the `.../d/<file-id>/view...` form.
        url: String,
    },
    /// Protected-areas registry serving a zip of zipped shapefiles.
    ProtectedPlanet {
        /// Direct download URL of the outer archive.
        url: String,
    },
    /// Plain file URL saved under its own name in the destination.
    Direct {
        /// File URL.
        url: String,
    },
    /// Endpoint that expects a form POST before serving the file.
    Post {
        /// Endpoint URL.
        url: String,
        /// Form fields sent with the request.
        body: BTreeMap<String, String>,
    },
    /// Basin outlines split into per-region archives under one URL prefix.
    Hydrobasins {
        /// URL prefix the per-region archive names are appended to.
        url_template: String,
        /// Region codes to download, in order.
        suffixes: Vec<String>,
    },
}

impl Source {
    /// The catalog key naming this source kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Zenodo { .. } => "zenodo",
            Self::GDrive { .. } => "gdrive",
            Self::ProtectedPlanet { .. } => "protectedplanet",
            Self::Direct { .. } => "direct",
            Self::Post { .. } => "post",
            Self::Hydrobasins { .. } => "hydrobasins",
        }
    }

    /// Downloads and unpacks the bundle's payload from this source.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the download, extraction, or cleanup of
    /// any part fails. The multi-region basins source stops at the first
    /// failed region.
    #[instrument(skip_all, fields(kind = self.kind()))]
    pub async fn retrieve(&self, bundle: &Bundle, ctx: &FetchContext) -> Result<(), FetchError> {
        match self {
            Self::Zenodo { url } => staged_archive(url, bundle, ctx).await,
            Self::GDrive { url } => {
                let file_id = drive_file_id(url)?;
                let download_url =
                    format!("https://docs.google.com/uc?export=download&id={file_id}");
                staged_archive(&download_url, bundle, ctx).await
            }
            Self::ProtectedPlanet { url } => {
                let staging = ctx.root.join(STAGING_PROTECTED_ARCHIVE);
                ctx.client
                    .fetch_to_file(RequestSpec::get(url), &staging, ctx.show_progress)
                    .await?;
                extract_nested(&staging, &ctx.destination(bundle))?;
                remove_file(&staging).await
            }
            Self::Direct { url } => in_place(url, None, bundle, ctx).await,
            Self::Post { url, body } => in_place(url, Some(body), bundle, ctx).await,
            Self::Hydrobasins {
                url_template,
                suffixes,
            } => basin_regions(url_template, suffixes, bundle, ctx).await,
        }
    }
}

/// Downloads `url` to the shared staging archive, extracts it into the
/// bundle's destination, and removes the archive.
async fn staged_archive(url: &str, bundle: &Bundle, ctx: &FetchContext) -> Result<(), FetchError> {
    let staging = ctx.root.join(STAGING_ARCHIVE);
    ctx.client
        .fetch_to_file(RequestSpec::get(url), &staging, ctx.show_progress)
        .await?;
    extract_archive(&staging, &ctx.destination(bundle))?;
    remove_file(&staging).await
}

/// Downloads `url` into the destination under its own file name, optionally
/// as a form POST, and honors the bundle's unzip flag.
async fn in_place(
    url: &str,
    form: Option<&BTreeMap<String, String>>,
    bundle: &Bundle,
    ctx: &FetchContext,
) -> Result<(), FetchError> {
    let file_name = url_basename(url)?;
    let dest = ctx.destination(bundle);
    let target = dest.join(file_name);

    let mut spec = RequestSpec::get(url);
    if let Some(form) = form {
        spec = spec.with_form(form);
    }
    ctx.client
        .fetch_to_file(spec, &target, ctx.show_progress)
        .await?;

    if bundle.unzip {
        extract_archive(&target, &dest)?;
        remove_file(&target).await?;
    }
    Ok(())
}

/// Downloads, extracts, and discards one archive per region, stopping at the
/// first failure so later regions are not fetched after a partial run.
async fn basin_regions(
    url_template: &str,
    suffixes: &[String],
    bundle: &Bundle,
    ctx: &FetchContext,
) -> Result<(), FetchError> {
    let dest = ctx.destination(bundle);
    for region in suffixes {
        let archive_name = basin_archive_name(region, ctx.basins_level);
        let url = format!("{url_template}{archive_name}");
        let target = dest.join(&archive_name);

        info!(region = %region, url = %url, "downloading basins region");
        let spec = RequestSpec::get(&url).with_headers(BROWSER_HEADERS);
        ctx.client
            .fetch_to_file(spec, &target, ctx.show_progress)
            .await?;
        extract_archive(&target, &dest)?;
        remove_file(&target).await?;
    }
    Ok(())
}

/// Archive name for one basins region at the given subdivision level.
#[must_use]
pub fn basin_archive_name(region: &str, level: u8) -> String {
    format!("hybas_{region}_lev{level:02}_v1c.zip")
}

/// File name of the merged world shapefile at the given subdivision level.
#[must_use]
pub fn world_basin_name(level: u8) -> String {
    format!("hybas_world_lev{level:02}_v1c.shp")
}

/// Extracts the file id from a cloud-drive share link.
///
/// Share links look like `https://drive.google.com/file/d/<id>/view?...`;
/// the id is the last path segment before the `/view` marker. Links missing
/// the marker or the separators around the id cannot be resolved.
fn drive_file_id(url: &str) -> Result<&str, FetchError> {
    let mut parts = VIEW_SPLIT.splitn(url, 2);
    let prefix = parts.next().unwrap_or_default();
    if parts.next().is_none() {
        return Err(FetchError::source_resolution(
            url,
            "'/view' marker not found in share link",
        ));
    }

    let segments: Vec<&str> = SEPARATOR_SPLIT.split(prefix).collect();
    if segments.len() < 2 {
        return Err(FetchError::source_resolution(
            url,
            "no path separator before the '/view' marker",
        ));
    }

    segments
        .last()
        .copied()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FetchError::source_resolution(url, "share link has an empty file id"))
}

/// Final path segment of a URL, used as the local file name.
fn url_basename(url: &str) -> Result<&str, FetchError> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| FetchError::source_resolution(url, "URL has no file name"))
}

async fn remove_file(path: &Path) -> Result<(), FetchError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| FetchError::io(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::zip_bytes;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_bundle(destination: &str, unzip: bool) -> Bundle {
        Bundle {
            countries: vec!["MA".to_string()],
            category: "data".to_string(),
            tutorial: false,
            destination: PathBuf::from(destination),
            sources: Vec::new(),
            outputs: Vec::new(),
            disable_by_opt: BTreeMap::new(),
            unzip,
        }
    }

    fn test_context(root: &Path) -> FetchContext {
        FetchContext::new(root).with_progress(false)
    }

    // ==================== File Id Tests ====================

    #[test]
    fn test_drive_file_id_from_share_link() {
        let url = "https://drive.google.com/file/d/1xCFKBnGnMGqDZ5nrSgNAZYqBhtBqIgQX/view?usp=sharing";
        assert_eq!(
            drive_file_id(url).unwrap(),
            "1xCFKBnGnMGqDZ5nrSgNAZYqBhtBqIgQX"
        );
    }

    #[test]
    fn test_drive_file_id_accepts_backslash_separators() {
        let url = "https:\\\\drive.google.com\\file\\d\\ABC123\\view";
        assert_eq!(drive_file_id(url).unwrap(), "ABC123");
    }

    #[test]
    fn test_drive_file_id_without_view_marker_fails() {
        let url = "https://drive.google.com/file/d/ABC123";
        let result = drive_file_id(url);
        assert!(matches!(result, Err(FetchError::SourceResolution { .. })));
    }

    #[test]
    fn test_drive_file_id_without_separator_fails() {
        let result = drive_file_id("ABC123/view");
        assert!(matches!(result, Err(FetchError::SourceResolution { .. })));
    }

    // ==================== Naming Tests ====================

    #[test]
    fn test_basin_archive_name_pads_level() {
        assert_eq!(basin_archive_name("af", 6), "hybas_af_lev06_v1c.zip");
        assert_eq!(basin_archive_name("sa", 12), "hybas_sa_lev12_v1c.zip");
    }

    #[test]
    fn test_world_basin_name_pads_level() {
        assert_eq!(world_basin_name(6), "hybas_world_lev06_v1c.shp");
    }

    #[test]
    fn test_url_basename_takes_last_segment() {
        assert_eq!(
            url_basename("https://example.com/data/gebco.zip").unwrap(),
            "gebco.zip"
        );
    }

    #[test]
    fn test_url_basename_rejects_trailing_slash() {
        let result = url_basename("https://example.com/data/");
        assert!(matches!(result, Err(FetchError::SourceResolution { .. })));
    }

    #[test]
    fn test_kind_names_match_catalog_keys() {
        let post = Source::Post {
            url: String::new(),
            body: BTreeMap::new(),
        };
        let basins = Source::Hydrobasins {
            url_template: String::new(),
            suffixes: Vec::new(),
        };
        assert_eq!(Source::Zenodo { url: String::new() }.kind(), "zenodo");
        assert_eq!(Source::GDrive { url: String::new() }.kind(), "gdrive");
        assert_eq!(post.kind(), "post");
        assert_eq!(basins.kind(), "hydrobasins");
    }

    // ==================== Retrieve Tests ====================

    #[tokio::test]
    async fn test_retrieve_direct_saves_under_url_file_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/eez.gpkg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"geodata".to_vec()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data/eez", false);
        let ctx = test_context(root.path());
        let source = Source::Direct {
            url: format!("{}/files/eez.gpkg", server.uri()),
        };

        source.retrieve(&bundle, &ctx).await.unwrap();

        let saved = root.path().join("data").join("eez").join("eez.gpkg");
        assert_eq!(std::fs::read(saved).unwrap(), b"geodata");
    }

    #[tokio::test]
    async fn test_retrieve_direct_unzips_and_discards_archive() {
        let server = MockServer::start().await;
        let payload = zip_bytes(&[("landcover.tif", b"raster".as_slice())]);
        Mock::given(method("GET"))
            .and(path("/files/landcover.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data/landcover", true);
        let ctx = test_context(root.path());
        let source = Source::Direct {
            url: format!("{}/files/landcover.zip", server.uri()),
        };

        source.retrieve(&bundle, &ctx).await.unwrap();

        let dest = root.path().join("data").join("landcover");
        assert_eq!(std::fs::read(dest.join("landcover.tif")).unwrap(), b"raster");
        assert!(!dest.join("landcover.zip").exists());
    }

    #[tokio::test]
    async fn test_retrieve_post_sends_form_fields() {
        let server = MockServer::start().await;
        let payload = zip_bytes(&[("ssp2.csv", b"rows".as_slice())]);
        Mock::given(method("POST"))
            .and(path("/api/download/gdp.zip"))
            .and(body_string_contains("year=2030"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
            .expect(1)
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data/gdp", true);
        let ctx = test_context(root.path());
        let mut body = BTreeMap::new();
        body.insert("year".to_string(), "2030".to_string());
        let source = Source::Post {
            url: format!("{}/api/download/gdp.zip", server.uri()),
            body,
        };

        source.retrieve(&bundle, &ctx).await.unwrap();

        let dest = root.path().join("data").join("gdp");
        assert!(dest.join("ssp2.csv").exists());
        assert!(!dest.join("gdp.zip").exists());
    }

    #[tokio::test]
    async fn test_retrieve_zenodo_stages_extracts_and_cleans_up() {
        let server = MockServer::start().await;
        let payload = zip_bytes(&[("resources/shapes.geojson", b"{}".as_slice())]);
        Mock::given(method("GET"))
            .and(path("/record/archive.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data", false);
        let ctx = test_context(root.path());
        let source = Source::Zenodo {
            url: format!("{}/record/archive.zip", server.uri()),
        };

        source.retrieve(&bundle, &ctx).await.unwrap();

        assert!(root
            .path()
            .join("data")
            .join("resources")
            .join("shapes.geojson")
            .exists());
        assert!(
            !root.path().join("tempfile.zip").exists(),
            "Staging archive should be removed after extraction"
        );
    }

    #[tokio::test]
    async fn test_retrieve_gdrive_bad_link_fails_without_request() {
        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data", false);
        let ctx = test_context(root.path());
        let source = Source::GDrive {
            url: "https://drive.google.com/file/d/ABC123".to_string(),
        };

        let result = source.retrieve(&bundle, &ctx).await;
        assert!(matches!(result, Err(FetchError::SourceResolution { .. })));
    }

    #[tokio::test]
    async fn test_retrieve_hydrobasins_stops_at_first_failed_region() {
        let server = MockServer::start().await;
        let payload = zip_bytes(&[("hybas_af_lev06_v1c.shp", b"af".as_slice())]);
        Mock::given(method("GET"))
            .and(path("/basins/hybas_af_lev06_v1c.zip"))
            .and(header("User-agent", "Mozilla/5.0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/basins/hybas_ar_lev06_v1c.zip"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        // The region after the failure must never be requested.
        Mock::given(method("GET"))
            .and(path("/basins/hybas_as_lev06_v1c.zip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data/basins", false);
        let ctx = test_context(root.path());
        let source = Source::Hydrobasins {
            url_template: format!("{}/basins/", server.uri()),
            suffixes: vec!["af".to_string(), "ar".to_string(), "as".to_string()],
        };

        let result = source.retrieve(&bundle, &ctx).await;

        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
        let dest = root.path().join("data").join("basins");
        assert!(dest.join("hybas_af_lev06_v1c.shp").exists());
        assert!(!dest.join("hybas_af_lev06_v1c.zip").exists());
    }

    #[tokio::test]
    async fn test_retrieve_hydrobasins_uses_configured_level() {
        let server = MockServer::start().await;
        let payload = zip_bytes(&[("hybas_af_lev04_v1c.shp", b"af".as_slice())]);
        Mock::given(method("GET"))
            .and(path("/basins/hybas_af_lev04_v1c.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
            .expect(1)
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let bundle = test_bundle("data/basins", false);
        let ctx = test_context(root.path()).with_basins_level(4);
        let source = Source::Hydrobasins {
            url_template: format!("{}/basins/", server.uri()),
            suffixes: vec!["af".to_string()],
        };

        source.retrieve(&bundle, &ctx).await.unwrap();
    }
}
