//! Update events — notifications flowing from the controller to the
//! presentation layer.

use std::path::PathBuf;

use crate::progress::ProgressSample;
use crate::release::{DownloadTarget, ReleaseCandidate};

/// Event types emitted while checking, downloading, and launching.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// Version resolution started.
    Checking,
    /// Newest release found on the index.
    Resolved(ReleaseCandidate),
    /// Transfer about to start.
    Downloading(DownloadTarget),
    /// Transfer progress.
    Progress(ProgressSample),
    /// Archive is on disk. `reused` means the existing file already matched.
    Downloaded {
        path: PathBuf,
        bytes: u64,
        reused: bool,
    },
    /// Unpacking this archive.
    Extracting(PathBuf),
    /// Handing this executable to the OS.
    Launching(PathBuf),
}

impl UpdateEvent {
    /// Format an event into a human-readable status line.
    pub fn format_status(&self) -> Option<String> {
        match self {
            Self::Checking => Some("🔍 Checking update...".to_string()),
            Self::Resolved(release) => {
                Some(format!("🆕 Latest build: {}", release.display_name))
            }
            Self::Downloading(target) => Some(format!("⬇️  Downloading {}...", target.tag)),
            Self::Progress(_) => None,
            Self::Downloaded { bytes, reused, .. } => {
                let size = human_size(*bytes);
                if *reused {
                    Some(format!("✅ Already up to date: {}", size))
                } else {
                    Some(format!("✅ Update success: {}", size))
                }
            }
            Self::Extracting(archive) => {
                let name = archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(format!("📦 Extracting {}...", name))
            }
            Self::Launching(_) => Some("🚀 Launching Yuzu...".to_string()),
        }
    }
}

/// Receives update events. Called from worker tasks; must not block.
pub trait UpdateObserver: Send + Sync {
    fn on_event(&self, event: UpdateEvent);
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl UpdateObserver for NullObserver {
    fn on_event(&self, _event: UpdateEvent) {}
}

/// Render a byte count with one decimal, e.g. `"1.5 MB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
