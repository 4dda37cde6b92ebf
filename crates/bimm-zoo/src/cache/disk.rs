//! # Disk Cache Policy

use crate::error::Error;
use burn::config::Config;
use burn::data::network::downloader;
use std::fs::{File, remove_file};
use std::io::Write;
use std::path::PathBuf;

/// Disk Cache Policy
#[derive(Config, Debug, PartialEq)]
pub struct DiskCacheConfig {
    /// Key for the root cache directory.
    #[config(default = "\"bimm-zoo\".to_string()")]
    pub root_cache_key: String,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskCacheConfig {
    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, does not create it.
    pub fn base_cache_dir(&self) -> Result<PathBuf, Error> {
        Ok(dirs::home_dir()
            .ok_or(Error::HomeDirNotFound)?
            .join(".cache")
            .join(&self.root_cache_key))
    }

    /// Map a resource key to a cache path.
    ///
    /// Does not ensure that the path (or any of the parents) exist.
    pub fn resource_to_path(
        &self,
        resource_key: &[&str],
    ) -> Result<PathBuf, Error> {
        let path = self.base_cache_dir()?;
        Ok(resource_key.iter().fold(path, |acc, s| acc.join(s)))
    }

    /// Map a resource key to a cache path and ensure the parent directory exists.
    pub fn ensure_resource_parent_dir(
        &self,
        resource_key: &[&str],
    ) -> Result<PathBuf, Error> {
        let path = self.resource_to_path(resource_key)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(path)
    }

    /// Fetch a Resource to the Cache.
    pub fn fetch_resource(
        &self,
        url: &str,
        resource_key: &[&str],
    ) -> Result<PathBuf, Error> {
        let cache_file_path = self.ensure_resource_parent_dir(resource_key)?;
        try_cache_download_to_path(url, cache_file_path)
    }
}

/// Download a URL resource to a given path.
///
/// If the path already exists, does nothing.
///
/// # Returns
///
/// The cache path.
pub fn try_cache_download_to_path(
    url: &str,
    cache_file_path: PathBuf,
) -> Result<PathBuf, Error> {
    if cache_file_path.exists() {
        log::debug!("Cache hit: {}", cache_file_path.display());
        return Ok(cache_file_path);
    }

    let file_name = cache_file_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());

    log::info!("Downloading {} to: {}", url, cache_file_path.display());
    let bytes = downloader::download_file_as_bytes(url, &file_name);

    let mut output_file = File::create(&cache_file_path)?;
    if let Err(err) = output_file.write_all(&bytes) {
        remove_file(&cache_file_path)?;
        return Err(err.into());
    }

    Ok(cache_file_path)
}
