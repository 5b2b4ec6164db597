//! Content-addressed audio cache.
//!
//! A blob with SHA-256 `h` lives at `<root>/h[0..2]/h[2..4]/h.<ext>`. All
//! 256x256 shard directories are created up front, so concurrent writers
//! never race on directory creation. Identical bytes always map to the same
//! path and are written at most once per run.

use crate::defaults::CACHE_FAN_OUT;
use crate::error::{PrepError, Result};
use crate::manifest::ManifestLine;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write-once blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create the cache root and every shard directory.
    ///
    /// Existing directories are left alone, so reopening a cache is cheap.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for a in 0..CACHE_FAN_OUT {
            let first = root.join(format!("{a:02x}"));
            for b in 0..CACHE_FAN_OUT {
                fs::create_dir_all(first.join(format!("{b:02x}"))).map_err(|e| {
                    PrepError::Other(format!(
                        "cannot create cache directory under {}: {e}",
                        root.display()
                    ))
                })?;
            }
        }
        tracing::debug!(root = %root.display(), "cache directories ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path for a blob with hex digest `hash`.
    pub fn path_for(&self, hash: &str, ext: &str) -> PathBuf {
        let name = if ext.is_empty() {
            hash.to_string()
        } else {
            format!("{hash}.{ext}")
        };
        self.root
            .join(hash.get(0..2).unwrap_or("00"))
            .join(hash.get(2..4).unwrap_or("00"))
            .join(name)
    }

    /// Store `bytes`, returning where they live. Writing is skipped when the
    /// blob is already present.
    pub fn put(&self, bytes: &[u8], ext: &str) -> Result<PathBuf> {
        let path = self.path_for(&content_hash(bytes), ext);
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        Ok(path)
    }

    /// Store the contents of `file`, keeping its extension.
    pub fn put_file(&self, file: &Path) -> Result<PathBuf> {
        let bytes = fs::read(file)?;
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.put(&bytes, &ext)
    }

    /// Copy a line's clip into the cache and point the line at the copy.
    pub fn cache_line(&self, line: &ManifestLine) -> Result<ManifestLine> {
        let cached = self.put_file(&line.clip_path)?;
        Ok(line.with_clip_path(cached))
    }
}
