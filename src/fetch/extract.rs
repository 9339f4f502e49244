//! Zip archive extraction.
//!
//! Extraction runs synchronously on the calling task. Bundles download one
//! at a time, so there is no executor to starve and no gain from handing the
//! work to a blocking pool.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use super::error::FetchError;

/// Extracts every entry of `archive` into `dest`.
///
/// # Errors
///
/// Returns [`FetchError::Io`] when the archive cannot be opened and
/// [`FetchError::Extract`] when it is not a valid zip or an entry cannot be
/// written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), FetchError> {
    let file = File::open(archive).map_err(|e| FetchError::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| FetchError::extract(archive, e))?;

    std::fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;
    zip.extract(dest).map_err(|e| FetchError::extract(archive, e))?;

    debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        entries = zip.len(),
        "archive extracted"
    );
    Ok(())
}

/// Unpacks the `.zip` entries nested inside `archive` into `dest`.
///
/// The protected-areas registry ships one download containing several
/// shapefile archives plus licensing text. Only the inner archives matter:
/// each one is pulled out of the outer archive, extracted into `dest`, and
/// then deleted. Other entries are left alone and recursion stops after one
/// level, so a zip inside an inner archive lands in `dest` as a file.
///
/// # Errors
///
/// Returns [`FetchError`] when the outer archive cannot be read or any inner
/// archive fails to extract or be removed.
pub fn extract_nested(archive: &Path, dest: &Path) -> Result<(), FetchError> {
    let file = File::open(archive).map_err(|e| FetchError::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| FetchError::extract(archive, e))?;
    let inner_names: Vec<String> = zip
        .file_names()
        .filter(|name| name.ends_with(".zip"))
        .map(str::to_string)
        .collect();

    std::fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

    for name in &inner_names {
        let inner = extract_member(&mut zip, name, dest, archive)?;
        extract_archive(&inner, dest)?;
        std::fs::remove_file(&inner).map_err(|e| FetchError::io(&inner, e))?;
    }

    if inner_names.is_empty() {
        debug!(archive = %archive.display(), "no nested archives found");
    } else {
        info!(
            dest = %dest.display(),
            inner_archives = inner_names.len(),
            "nested archives extracted"
        );
    }
    Ok(())
}

/// Copies one entry of the open archive to a file under `dest` and returns
/// its path.
fn extract_member(
    zip: &mut ZipArchive<File>,
    name: &str,
    dest: &Path,
    archive: &Path,
) -> Result<PathBuf, FetchError> {
    let mut entry = zip
        .by_name(name)
        .map_err(|e| FetchError::extract(archive, e))?;

    let Some(relative) = entry.enclosed_name() else {
        return Err(FetchError::extract(
            archive,
            ZipError::InvalidArchive("entry name escapes the destination"),
        ));
    };
    let target = dest.join(relative);

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
    }
    let mut out = File::create(&target).map_err(|e| FetchError::io(&target, e))?;
    std::io::copy(&mut entry, &mut out).map_err(|e| FetchError::io(&target, e))?;

    Ok(target)
}
