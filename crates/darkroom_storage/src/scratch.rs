//! Scratch files for renditions awaiting upload.

use bytes::Bytes;
use darkroom_core::{PhotoId, VariantSize};
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};

/// Directory holding renditions between encode and upload.
///
/// Files are named `{original}_{size}.jpg`.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Use `path` as scratch space, creating it if needed.
    pub fn new(path: impl Into<PathBuf>) -> DarkroomResult<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Self { path })
    }

    /// Scratch directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the rendition of `original` at `size`.
    #[tracing::instrument(skip(self, data), fields(original = %original, size = %size))]
    pub async fn write(
        &self,
        original: &PhotoId,
        size: VariantSize,
        data: &[u8],
    ) -> DarkroomResult<ScratchFile> {
        let path = self.path.join(size.file_name(original));
        tokio::fs::write(&path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Scratch(format!("{}: {}", path.display(), e)))
        })?;
        Ok(ScratchFile {
            path,
            removed: false,
        })
    }
}

/// A rendition on disk.
///
/// Removed by [`ScratchFile::discard`]; if dropped without that, removal is
/// attempted synchronously.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directory.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the rendition back.
    pub async fn read(&self) -> DarkroomResult<Bytes> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Scratch(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;
        Ok(Bytes::from(data))
    }

    /// Remove the file.
    pub async fn discard(mut self) -> DarkroomResult<()> {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::Scratch(format!(
                "remove {}: {}",
                self.path.display(),
                e
            )))
            .into()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
