//! Blob storage: one opaque file per cache key

use crate::error::{SkyshotError, SkyshotResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Storage backend for image payloads
///
/// Blobs are never inspected. `write_blob` must not return until the bytes
/// are durable, since metadata is registered right after it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, returning its path
    async fn write_blob(&self, name: &str, bytes: &[u8]) -> SkyshotResult<PathBuf>;

    /// Path of a blob if it currently exists
    async fn blob_path(&self, name: &str) -> Option<PathBuf>;

    /// Delete a blob. Deleting an absent blob succeeds.
    async fn delete_blob(&self, name: &str) -> SkyshotResult<()>;

    /// Names of stored blobs with the given extension
    async fn list_blobs(&self, extension: &str) -> SkyshotResult<Vec<String>>;
}

/// Directory-backed blob store
///
/// Names must be a single path component; anything else is refused
/// rather than joined onto the directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create a blob store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> SkyshotResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(name)),
            _ => Err(SkyshotError::InvalidBlobName(name.to_string())),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write_blob(&self, name: &str, bytes: &[u8]) -> SkyshotResult<PathBuf> {
        let path = self.path_of(name)?;
        let blob_err = |source: std::io::Error| SkyshotError::BlobWrite {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(blob_err)?;
        replace_file(&path, bytes).await.map_err(blob_err)?;

        debug!("Wrote blob {} ({} bytes)", name, bytes.len());
        Ok(path)
    }

    async fn blob_path(&self, name: &str) -> Option<PathBuf> {
        let path = self.path_of(name).ok()?;
        match fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    async fn delete_blob(&self, name: &str) -> SkyshotResult<()> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SkyshotError::io(
                format!("removing blob {}", path.display()),
                e,
            )),
        }
    }

    async fn list_blobs(&self, extension: &str) -> SkyshotResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(SkyshotError::io("reading cache directory", e)),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SkyshotError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == extension) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Replace `path` with `bytes` through a synced temp file and a rename
///
/// Readers see either the old content or the new, never a truncated file.
/// The temp file is removed if any step fails.
pub(crate) async fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = temp_sibling(path);

    let result = match write_synced(&tmp_path, bytes).await {
        Ok(()) => fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
