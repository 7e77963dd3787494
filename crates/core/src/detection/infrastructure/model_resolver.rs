use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Locates model files in a local cache, downloading them on first use.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    cache_dir: PathBuf,
}

impl ModelResolver {
    /// Resolver rooted at the platform cache directory.
    ///
    /// - macOS: `~/Library/Application Support/facebatch/models/`
    /// - Linux: `$XDG_CACHE_HOME/facebatch/models/` or `~/.cache/facebatch/models/`
    /// - Windows: `%LOCALAPPDATA%/facebatch/models/`
    pub fn new() -> Result<Self, ModelResolveError> {
        #[cfg(target_os = "macos")]
        let base = dirs::data_dir();
        #[cfg(not(target_os = "macos"))]
        let base = dirs::cache_dir();

        base.map(|d| Self::with_cache_dir(d.join("facebatch").join("models")))
            .ok_or(ModelResolveError::NoCacheDir)
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Returns the cached copy of `name`, downloading it from `url` if absent.
    pub fn resolve(&self, name: &str, url: &str) -> Result<PathBuf, ModelResolveError> {
        let cached_path = self.cache_dir.join(name);
        if cached_path.exists() {
            return Ok(cached_path);
        }

        fs::create_dir_all(&self.cache_dir).map_err(|source| ModelResolveError::CacheDir {
            path: self.cache_dir.clone(),
            source,
        })?;
        log::info!("Downloading {url}");
        download(url, &cached_path)?;
        Ok(cached_path)
    }
}

/// Downloads to a `.part` file and renames on success, so a failed
/// download never leaves a truncated model at `dest`.
fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(url: &str, dest: &Path, temp_path: &Path) -> Result<(), ModelResolveError> {
    let write_err = |source| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    let mut last_logged: u64 = 0;
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if downloaded - last_logged >= 16 * 1024 * 1024 {
            log::debug!("Downloaded {downloaded} of {total} bytes");
            last_logged = downloaded;
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BAD_URL: &str = "http://invalid.nonexistent.example.com/model.onnx";

    #[test]
    fn test_resolve_returns_cached_file_without_download() {
        let tmp = TempDir::new().unwrap();
        let model_path = tmp.path().join("model.onnx");
        fs::write(&model_path, b"fake model data").unwrap();

        let resolver = ModelResolver::with_cache_dir(tmp.path());
        assert_eq!(resolver.resolve("model.onnx", BAD_URL).unwrap(), model_path);
    }

    #[test]
    fn test_resolve_creates_cache_dir_before_download() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("nested").join("models");
        let resolver = ModelResolver::with_cache_dir(&cache);

        assert!(resolver.resolve("model.onnx", BAD_URL).is_err());
        assert!(cache.is_dir());
    }

    #[test]
    fn test_default_cache_dir_is_app_scoped() {
        let resolver = ModelResolver::new().unwrap();
        let path = resolver.cache_dir.to_string_lossy().into_owned();
        assert!(path.contains("facebatch"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_failed_download_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let err = download(BAD_URL, &dest).unwrap_err();
        assert!(matches!(err, ModelResolveError::Download { .. }));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
