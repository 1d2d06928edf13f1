//! Update controller — orchestrates "check & update" and "launch", and
//! keeps the two from touching the shared directories at the same time.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;
use tracing::{error, info, warn};

use pineapple_core::config::{ResolvedPaths, UpdaterConfig};
use pineapple_core::error::{Result, UpdaterError};
use pineapple_core::event::{UpdateEvent, UpdateObserver};
use pineapple_core::progress::progress_channel;
use pineapple_core::release::{AssetLocator, DownloadTarget, ReleaseCandidate};

use crate::archive::ArchiveStore;
use crate::downloader::{DownloadEngine, DownloadReport};
use crate::extractor::Extractor;
use crate::launcher::{Launcher, SystemLauncher};
use crate::resolver::VersionResolver;

/// What the controller is busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Downloading = 1,
    Launching = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Downloading,
            2 => Self::Launching,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Downloading => write!(f, "downloading"),
            Self::Launching => write!(f, "launching"),
        }
    }
}

/// Holds a non-idle phase; returns the controller to idle when dropped,
/// whichever way the operation ends.
struct PhaseGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    /// Move from idle to `phase`, or report the phase currently held.
    fn acquire(state: &'a AtomicU8, phase: Phase) -> std::result::Result<Self, Phase> {
        state
            .compare_exchange(
                Phase::Idle as u8,
                phase as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| Self { state })
            .map_err(Phase::from_u8)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.state.store(Phase::Idle as u8, Ordering::Release);
    }
}

/// Result of a successful check & update.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub release: ReleaseCandidate,
    pub target: DownloadTarget,
    pub report: DownloadReport,
}

/// Owns both pipelines and the guard between them.
pub struct UpdateController {
    resolver: VersionResolver,
    locator: AssetLocator,
    engine: DownloadEngine,
    store: ArchiveStore,
    extractor: Extractor,
    launcher: Arc<dyn Launcher>,
    data_dir: PathBuf,
    phase: AtomicU8,
    shutdown: watch::Sender<bool>,
}

impl UpdateController {
    /// Build a controller with directories resolved against the current
    /// working directory, once.
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        let paths = config.paths.resolve_from_cwd()?;
        Self::with_paths(config, paths)
    }

    pub fn with_paths(config: &UpdaterConfig, paths: ResolvedPaths) -> Result<Self> {
        let resolver = VersionResolver::new(
            config.source.index_url.clone(),
            config.source.index_selector.clone(),
            config.network.resolve_timeout(),
        )?;
        let engine = DownloadEngine::new(
            config.source.user_agent.clone(),
            config.network.connect_timeout(),
            config.network.read_timeout(),
        )?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            resolver,
            locator: AssetLocator::new(
                config.source.asset_url_template.clone(),
                paths.archive_dir.clone(),
            ),
            engine,
            store: ArchiveStore::new(paths.archive_dir, config.paths.archive_selection),
            extractor: Extractor::new(config.paths.executable.clone()),
            launcher: Arc::new(SystemLauncher),
            data_dir: paths.data_dir,
            phase: AtomicU8::new(Phase::Idle as u8),
            shutdown,
        })
    }

    /// Replace the OS launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_downloading(&self) -> bool {
        self.phase() == Phase::Downloading
    }

    pub fn archive_store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve the newest release and download it unless it is already on
    /// disk. Progress goes to `observer` from a separate task.
    pub async fn check_for_update(
        &self,
        observer: Arc<dyn UpdateObserver>,
    ) -> Result<UpdateOutcome> {
        let result = self
            .until_shutdown(self.check_and_download(observer))
            .await;
        if let Err(e) = &result {
            error!("Update failed: {}", e);
        }
        result
    }

    async fn check_and_download(
        &self,
        observer: Arc<dyn UpdateObserver>,
    ) -> Result<UpdateOutcome> {
        observer.on_event(UpdateEvent::Checking);
        let release = self.resolver.resolve().await?;
        observer.on_event(UpdateEvent::Resolved(release.clone()));
        let target = self.locator.locate(&release)?;

        let _guard = PhaseGuard::acquire(&self.phase, Phase::Downloading).map_err(|held| {
            warn!("Update requested while {}", held);
            UpdaterError::Busy
        })?;
        info!("Downloading {} from {}", target.tag, target.asset_url);
        observer.on_event(UpdateEvent::Downloading(target.clone()));

        let (mut tx, mut rx) = progress_channel();
        let forward = {
            let observer = observer.clone();
            tokio::spawn(async move {
                while let Some(sample) = rx.recv().await {
                    observer.on_event(UpdateEvent::Progress(sample));
                }
            })
        };

        let result = self.engine.download(&target, &mut tx).await;
        drop(tx);
        if let Err(e) = forward.await {
            warn!("Progress forwarder stopped: {}", e);
        }
        let report = result?;

        observer.on_event(UpdateEvent::Downloaded {
            path: report.path.clone(),
            bytes: report.bytes,
            reused: report.reused,
        });
        Ok(UpdateOutcome {
            release,
            target,
            report,
        })
    }

    /// Extract the selected archive and launch its executable.
    ///
    /// Refused with [`UpdaterError::DownloadInProgress`] while a download
    /// runs; nothing is touched in that case.
    pub async fn request_launch(&self, observer: Arc<dyn UpdateObserver>) -> Result<PathBuf> {
        let _guard = match PhaseGuard::acquire(&self.phase, Phase::Launching) {
            Ok(guard) => guard,
            Err(Phase::Downloading) => return Err(UpdaterError::DownloadInProgress),
            Err(_) => return Err(UpdaterError::Busy),
        };

        let result = self.until_shutdown(self.extract_and_launch(observer)).await;
        if let Err(e) = &result {
            error!("Launch failed: {}", e);
        }
        result
    }

    async fn extract_and_launch(&self, observer: Arc<dyn UpdateObserver>) -> Result<PathBuf> {
        let archive = self
            .store
            .select_for_extraction()?
            .ok_or_else(|| UpdaterError::NoArchive(self.store.dir().display().to_string()))?;
        observer.on_event(UpdateEvent::Extracting(archive.path.clone()));

        let extractor = self.extractor.clone();
        let dest = self.data_dir.clone();
        let source = archive.path.clone();
        let exe = tokio::task::spawn_blocking(move || extractor.extract(&source, &dest))
            .await
            .map_err(|e| UpdaterError::Extract(e.to_string()))??;

        observer.on_event(UpdateEvent::Launching(exe.clone()));
        self.launcher.launch(&exe).await?;
        Ok(exe)
    }

    /// Cancel in-flight operations and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// True once [`shutdown`](Self::shutdown) was called; never resets.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn until_shutdown<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        if self.is_shut_down() {
            return Err(UpdaterError::Cancelled);
        }
        let mut stopped = self.shutdown.subscribe();
        tokio::select! {
            result = work => result,
            _ = stopped.wait_for(|stop| *stop) => Err(UpdaterError::Cancelled),
        }
    }
}
