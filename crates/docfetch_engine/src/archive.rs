use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docfetch_core::short_hash;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::persist::parent_dir;

/// Highest deflate level.
const COMPRESSION_LEVEL: i32 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot read {path:?}: {source}")]
    Source { path: PathBuf, source: io::Error },
    #[error("{0}")]
    Write(#[from] io::Error),
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive task failed: {0}")]
    Task(String),
}

impl ArchiveError {
    /// Short label used as the report's `reason`.
    pub fn reason(&self) -> &'static str {
        match self {
            ArchiveError::Write(_) => "write error",
            ArchiveError::Source { .. } | ArchiveError::Zip(_) => "zip error",
            ArchiveError::Task(_) => "zip failed",
        }
    }
}

#[derive(Debug)]
pub enum ArchiveOutcome {
    Written { path: PathBuf, members: Vec<String> },
    /// Nothing to bundle; no archive file was created.
    NoFiles,
    Failed(ArchiveError),
}

impl ArchiveOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ArchiveOutcome::Failed(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ArchiveOutcome::Written { .. } => None,
            ArchiveOutcome::NoFiles => Some("no files"),
            ArchiveOutcome::Failed(err) => Some(err.reason()),
        }
    }
}

/// Bundle `paths` into `zip_path` without blocking the runtime.
pub async fn archive(paths: &[PathBuf], zip_path: &Path) -> ArchiveOutcome {
    if paths.is_empty() {
        return ArchiveOutcome::NoFiles;
    }
    let paths = paths.to_vec();
    let target = zip_path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        write_archive(&paths, &target).map(|members| (target, members))
    })
    .await;

    match result {
        Ok(Ok((path, members))) => ArchiveOutcome::Written { path, members },
        Ok(Err(err)) => ArchiveOutcome::Failed(err),
        Err(err) => ArchiveOutcome::Failed(ArchiveError::Task(err.to_string())),
    }
}

/// Write a deflate archive with one member per file, named by base filename.
///
/// The archive is assembled in a temp file next to `zip_path` and renamed
/// into place once complete, so a failed run leaves no truncated archive.
pub fn write_archive(paths: &[PathBuf], zip_path: &Path) -> Result<Vec<String>, ArchiveError> {
    let dir = parent_dir(zip_path);
    fs::create_dir_all(&dir)?;

    let names = member_names(paths);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());
        for (path, name) in paths.iter().zip(&names) {
            let mut source = File::open(path).map_err(|source| ArchiveError::Source {
                path: path.clone(),
                source,
            })?;
            writer.start_file(name.as_str(), options)?;
            io::copy(&mut source, &mut writer)?;
        }
        writer.finish()?;
    }
    tmp.as_file_mut().flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(zip_path).map_err(|e| ArchiveError::Write(e.error))?;
    Ok(names)
}

/// Base filenames, with `--{short_hash(path)}` added before the extension of
/// any name already taken by an earlier path.
fn member_names(paths: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let base = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".to_string());
            let name = if taken.contains(&base) {
                let hash = short_hash(&path.to_string_lossy());
                match base.rsplit_once('.') {
                    Some((stem, ext)) => format!("{stem}--{hash}.{ext}"),
                    None => format!("{base}--{hash}"),
                }
            } else {
                base
            };
            taken.insert(name.clone());
            name
        })
        .collect()
}
