use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid target path: {0}")]
    InvalidTarget(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("write task failed: {0}")]
    Task(String),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Writer for the directory holding `target`.
    pub fn for_target(target: &Path) -> Result<(Self, String), PersistError> {
        let filename = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| PersistError::InvalidTarget(target.display().to_string()))?;
        Ok((Self::new(parent_dir(target)), filename))
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // rename(2) replaces an existing target in one step.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Directory part of `path`, `.` when it has none.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write `bytes` to `target` off the async runtime. Parent directories are
/// created; nothing is left at `target` on failure.
pub async fn persist_bytes(target: PathBuf, bytes: Bytes) -> Result<PathBuf, PersistError> {
    tokio::task::spawn_blocking(move || {
        let (writer, filename) = AtomicFileWriter::for_target(&target)?;
        writer.write(&filename, &bytes)
    })
    .await
    .map_err(|err| PersistError::Task(err.to_string()))?
}

/// Whether anything exists at `path`. Errors while probing count as absent.
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
