//! Archive store — the directory of previously downloaded release archives.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::debug;

use pineapple_core::config::ArchiveSelection;
use pineapple_core::error::Result;

/// One downloaded archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl ArchiveFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn modified_local(&self) -> DateTime<Local> {
        DateTime::<Local>::from(self.modified)
    }
}

/// Lists archives and picks the one to unpack.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
    selection: ArchiveSelection,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>, selection: ArchiveSelection) -> Self {
        Self {
            dir: dir.into(),
            selection,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every regular file in the archive directory, oldest first.
    /// A missing directory is an empty store.
    pub fn list(&self) -> Result<Vec<ArchiveFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            archives.push(ArchiveFile {
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified()?,
            });
        }
        archives.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(archives)
    }

    /// The archive to extract, per the configured selection policy.
    pub fn select_for_extraction(&self) -> Result<Option<ArchiveFile>> {
        let mut archives = self.list()?;
        let picked = match self.selection {
            ArchiveSelection::Oldest => archives.into_iter().next(),
            ArchiveSelection::Newest => archives.pop(),
        };
        if let Some(archive) = &picked {
            debug!("Selected archive {} ({:?})", archive.path.display(), self.selection);
        }
        Ok(picked)
    }
}
