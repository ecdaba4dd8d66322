//! Zip bundles: `datapackage.json` plus the local data files

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

/// Descriptor file name inside a bundle
pub const DESCRIPTOR_NAME: &str = "datapackage.json";

pub(crate) fn is_bundle(location: &str) -> bool {
    location.to_ascii_lowercase().ends_with(".zip")
}

/// Extract `archive` into a fresh temporary directory.
///
/// Returns the directory, which must outlive any use of the extracted
/// files, and the path of the bundled descriptor.
#[cfg(feature = "zip-bundle")]
pub(crate) fn extract(archive: &Path) -> Result<(TempDir, PathBuf)> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let descriptor = zip
        .file_names()
        .filter(|name| *name == DESCRIPTOR_NAME || name.ends_with(&format!("/{}", DESCRIPTOR_NAME)))
        .min_by_key(|name| name.len())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Descriptor(format!(
                "Bundle {} does not contain a {}",
                archive.display(),
                DESCRIPTOR_NAME
            ))
        })?;

    let dir = tempfile::tempdir()?;
    zip.extract(dir.path())?;
    debug!("Extracted {} into {}", archive.display(), dir.path().display());
    let descriptor = dir.path().join(descriptor);
    Ok((dir, descriptor))
}

#[cfg(not(feature = "zip-bundle"))]
pub(crate) fn extract(archive: &Path) -> Result<(TempDir, PathBuf)> {
    Err(Error::Descriptor(format!(
        "Loading bundle {} requires the `zip-bundle` feature",
        archive.display()
    )))
}

#[cfg(feature = "zip-bundle")]
fn file_options() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

/// Archive bytes with the descriptor first, then each `(name, content)`
#[cfg(feature = "zip-bundle")]
pub(crate) fn write(descriptor: &[u8], files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file(DESCRIPTOR_NAME, file_options())?;
    zip.write_all(descriptor)?;
    for (name, content) in files {
        zip.start_file(name.as_str(), file_options())?;
        zip.write_all(content)?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(not(feature = "zip-bundle"))]
pub(crate) fn write(_descriptor: &[u8], _files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    Err(Error::Descriptor(
        "Saving a bundle requires the `zip-bundle` feature".to_string(),
    ))
}
