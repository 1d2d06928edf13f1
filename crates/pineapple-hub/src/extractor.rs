//! Extractor — unpack an archive into a clean directory and find the
//! executable it produced.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};
use zip::ZipArchive;

use pineapple_core::error::{Result, UpdaterError};

/// Unpacks release archives.
#[derive(Debug, Clone)]
pub struct Extractor {
    executable: String,
}

impl Extractor {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Wipe `dest`, unpack `archive` into it, and return the path of the
    /// executable inside the first top-level folder.
    ///
    /// Blocking; run it off the async runtime.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<PathBuf> {
        let started = Instant::now();

        fs::create_dir_all(dest).map_err(extract_err)?;
        clear_dir(dest).map_err(extract_err)?;
        unzip(archive, dest)?;
        info!(
            "Extracted {} in {} ms",
            archive.display(),
            started.elapsed().as_millis()
        );

        let folder = first_subdirectory(dest).map_err(extract_err)?.ok_or_else(|| {
            UpdaterError::Extract(format!("{} has no top-level folder", archive.display()))
        })?;
        Ok(folder.join(&self.executable))
    }
}

fn extract_err(e: impl std::fmt::Display) -> UpdaterError {
    UpdaterError::Extract(e.to_string())
}

/// Remove every entry inside `dir`, keeping `dir` itself.
fn clear_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn unzip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(extract_err)?;
    let mut archive = ZipArchive::new(file).map_err(extract_err)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(extract_err)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(UpdaterError::Extract(format!(
                "Unsafe archive entry: {}",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(extract_err)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(extract_err)?;
        }
        let mut out = File::create(&target).map_err(extract_err)?;
        io::copy(&mut entry, &mut out).map_err(extract_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                    .map_err(extract_err)?;
            }
        }
    }
    debug!("Unpacked {} entries into {}", archive.len(), dest.display());
    Ok(())
}

/// First directory in `dir`, by name.
fn first_subdirectory(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders.into_iter().next())
}
