//! Filesystem module store: one file per module under a store directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::ModuleStore;

/// Error type for the filesystem store.
#[derive(Debug, thiserror::Error)]
pub enum FsStoreError {
    /// I/O failure on a store path.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Module names must be plain file names.
    #[error("invalid module name: {0:?}")]
    InvalidName(String),
}

/// Writes modules into a directory, creating it on first write.
#[derive(Debug, Clone)]
pub struct FsModuleStore {
    dir: PathBuf,
}

impl FsModuleStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, FsStoreError> {
        let plain = Path::new(name).file_name().map_or(false, |f| f == name);
        if !plain || name.is_empty() {
            return Err(FsStoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FsStoreError + '_ {
    move |source| FsStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ModuleStore for FsModuleStore {
    type Error = FsStoreError;

    async fn write_module(&self, name: &str, text: &str) -> Result<String, Self::Error> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error(&self.dir))?;

        // Write to a sibling temp file and rename so readers never see a
        // partially written module.
        let tmp = self.dir.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, text).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error(&path))?;

        Ok(self.location(name))
    }

    async fn read_module(&self, name: &str) -> Result<Option<String>, Self::Error> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn location(&self, name: &str) -> String {
        self.dir.join(name).to_string_lossy().into_owned()
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                tokio::fs::remove_file(&path).await.map_err(io_error(&path))?;
            }
        }
        Ok(())
    }
}
