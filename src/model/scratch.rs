use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Run-wide temp root under which each image chapter gets its own directory
///
/// Chapter directories are removed when their records are dropped; the root
/// is removed when the last clone is dropped, and [`ScratchSpace::purge`]
/// removes everything immediately for abnormal exits.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: Arc<TempDir>,
}

impl ScratchSpace {
    /// Creates a fresh root in the system temp directory
    pub fn new() -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("serial-harvest-")
            .tempdir()?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Creates a directory for one chapter's downloaded images
    pub fn chapter_dir(&self) -> io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix("chapter-")
            .tempdir_in(self.root.path())
    }

    /// Removes the root and everything below it
    pub fn purge(&self) -> io::Result<PathBuf> {
        let path = self.root.path().to_path_buf();
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(path)
    }
}
