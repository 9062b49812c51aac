use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// Scratch directory owning every extracted or downloaded font of one run.
/// Dropping it removes the files, whether the run succeeded or not.
pub struct FontWorkspace {
    dir: TempDir,
}

impl FontWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pdf-translator-fonts-")
            .tempdir()
            .with_context(|| "failed to create font workspace")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn existing(&self, file_name: &str) -> Option<PathBuf> {
        let path = self.dir.path().join(file_name);
        path.exists().then_some(path)
    }

    /// Writes `bytes` unless the destination already exists.
    pub fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        if path.exists() {
            return Ok(path);
        }
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write font: {}", path.display()))?;
        Ok(path)
    }

    /// Removes a file that failed validation so a later attempt can retry.
    pub fn discard(&self, path: &Path) {
        if path.starts_with(self.dir.path())
            && let Err(err) = fs::remove_file(path)
        {
            warn!("failed to remove {}: {}", path.display(), err);
        }
    }
}
