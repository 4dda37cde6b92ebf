//! # Archive Extraction

use crate::error::Error;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;

/// Extract a `.tar.gz` archive into `dest_dir`.
///
/// The archive's leading directory entry names the extracted root.
/// If that root already exists, extraction is skipped.
///
/// The archive is unpacked into a ``.<root>.partial`` staging directory
/// and renamed into place, so an interrupted extraction never leaves a
/// partial root behind.
///
/// # Returns
///
/// The extracted root directory.
pub fn extract_tar_gz(
    archive_file: &Path,
    dest_dir: &Path,
) -> Result<PathBuf, Error> {
    let root = {
        let mut archive = Archive::new(GzDecoder::new(File::open(archive_file)?));
        let entry = archive
            .entries()?
            .next()
            .ok_or_else(|| Error::Archive(format!("no entries in {}", archive_file.display())))??;
        let path = entry.path()?.into_owned();
        match path.components().next() {
            Some(first) => PathBuf::from(first.as_os_str()),
            None => return Err(Error::Archive("empty leading entry path".to_string())),
        }
    };

    let extracted = dest_dir.join(&root);
    if extracted.exists() {
        log::info!("Archive already extracted to: {}", extracted.display());
        return Ok(extracted);
    }

    log::info!(
        "Extracting archive {} to: {}",
        archive_file.display(),
        dest_dir.display()
    );
    let staging = dest_dir.join(format!(".{}.partial", root.display()));
    if staging.exists() {
        log::info!("Removing stale staging directory: {}", staging.display());
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    let mut archive = Archive::new(GzDecoder::new(File::open(archive_file)?));
    archive.unpack(&staging)?;
    std::fs::rename(staging.join(&root), &extracted)?;
    std::fs::remove_dir_all(&staging)?;

    Ok(extracted)
}
