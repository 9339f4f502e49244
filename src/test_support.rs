//! Shared helpers for unit tests.

#![allow(clippy::unwrap_used)]

use std::io::Write;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds a zip archive in memory from (entry name, content) pairs.
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
