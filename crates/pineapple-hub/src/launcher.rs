//! Launcher — hand an executable to the operating system.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use pineapple_core::error::{Result, UpdaterError};

/// Opens a launch target. Implementations must not wait for the
/// launched program to exit.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, target: &Path) -> Result<()>;
}

/// Opens files with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn command(target: &Path) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            // The empty argument after "start" is the window title.
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };
        cmd.arg(target);
        cmd
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn launch(&self, target: &Path) -> Result<()> {
        if !target.is_file() {
            return Err(UpdaterError::LaunchTargetMissing(
                target.display().to_string(),
            ));
        }

        let child = Self::command(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| UpdaterError::Launch(format!("{}: {}", target.display(), e)))?;

        info!("Launched {} (pid {:?})", target.display(), child.id());
        Ok(())
    }
}
