//! Configuration management for Pineapple.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, UpdaterError};

/// Top-level Pineapple configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Where releases are discovered and downloaded from.
    #[serde(default)]
    pub source: SourceSettings,

    /// Timeouts.
    #[serde(default)]
    pub network: NetworkSettings,

    /// Local directories and launch conventions.
    #[serde(default)]
    pub paths: PathSettings,
}

/// Release source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// HTML page listing releases, newest first.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// CSS selector for the release anchors on the index page.
    #[serde(default = "default_index_selector")]
    pub index_selector: String,

    /// Asset URL with `{tag}` placeholders.
    #[serde(default = "default_asset_url_template")]
    pub asset_url_template: String,

    /// Sent on asset downloads; some hosts reject default agents.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_index_url() -> String {
    "https://pineappleea.github.io".to_string()
}

fn default_index_selector() -> String {
    "div.scrollbox > a".to_string()
}

fn default_asset_url_template() -> String {
    "https://github.com/pineappleEA/pineapple-src/releases/download/{tag}/Windows-Yuzu-{tag}.zip"
        .to_string()
}

fn default_user_agent() -> String {
    "Mozilla/4.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0)".to_string()
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            index_selector: default_index_selector(),
            asset_url_template: default_asset_url_template(),
            user_agent: default_user_agent(),
        }
    }
}

/// Network timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Max silence between two body chunks before a transfer counts as stalled.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_resolve_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_read_timeout() -> u64 {
    30
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            resolve_timeout_secs: 10,
            connect_timeout_secs: 60,
            read_timeout_secs: 30,
        }
    }
}

impl NetworkSettings {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Which archive to unpack when several have accumulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSelection {
    /// Smallest modification time wins.
    #[default]
    Oldest,
    /// Largest modification time wins.
    Newest,
}

/// Local filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Downloaded archives accumulate here (None = `<cwd>/yuzu`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_dir: Option<PathBuf>,

    /// Extraction scratch directory (None = `<cwd>/data`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// File name of the executable inside the extracted folder.
    #[serde(default = "default_executable")]
    pub executable: String,

    #[serde(default)]
    pub archive_selection: ArchiveSelection,
}

fn default_executable() -> String {
    "yuzu.exe".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            archive_dir: None,
            data_dir: None,
            executable: default_executable(),
            archive_selection: ArchiveSelection::default(),
        }
    }
}

/// Directories resolved once against a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub archive_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl PathSettings {
    /// Resolve relative or missing directories against `base`.
    pub fn resolve(&self, base: &Path) -> ResolvedPaths {
        let pick = |configured: &Option<PathBuf>, fallback: &str| match configured {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => base.join(p),
            None => base.join(fallback),
        };
        ResolvedPaths {
            archive_dir: pick(&self.archive_dir, "yuzu"),
            data_dir: pick(&self.data_dir, "data"),
        }
    }

    /// Resolve against the process working directory.
    pub fn resolve_from_cwd(&self) -> Result<ResolvedPaths> {
        let cwd = std::env::current_dir()
            .map_err(|e| UpdaterError::Config(format!("No working directory: {}", e)))?;
        Ok(self.resolve(&cwd))
    }
}

impl UpdaterConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| UpdaterError::Config(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| UpdaterError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| UpdaterError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.source.asset_url_template.contains("{tag}") {
            return Err(UpdaterError::Config(
                "asset_url_template must contain a {tag} placeholder".into(),
            ));
        }
        if self.paths.executable.trim().is_empty() {
            return Err(UpdaterError::Config("executable must not be empty".into()));
        }
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pineapple")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UpdaterConfig::default();
        assert_eq!(config.source.index_url, "https://pineappleea.github.io");
        assert_eq!(config.source.index_selector, "div.scrollbox > a");
        assert_eq!(config.network.resolve_timeout(), Duration::from_secs(10));
        assert_eq!(config.network.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.paths.executable, "yuzu.exe");
        assert_eq!(config.paths.archive_selection, ArchiveSelection::Oldest);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = UpdaterConfig::parse(
            r#"
            [network]
            read_timeout_secs = 5

            [paths]
            archive_selection = "newest"
            archive_dir = "downloads"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.read_timeout_secs, 5);
        assert_eq!(config.network.connect_timeout_secs, 60);
        assert_eq!(config.paths.archive_selection, ArchiveSelection::Newest);
        assert_eq!(config.source.user_agent, default_user_agent());

        let resolved = config.paths.resolve(Path::new("/opt/app"));
        assert_eq!(resolved.archive_dir, PathBuf::from("/opt/app/downloads"));
        assert_eq!(resolved.data_dir, PathBuf::from("/opt/app/data"));
    }

    #[test]
    fn test_template_without_tag_is_rejected() {
        let err = UpdaterConfig::parse(
            r#"
            [source]
            asset_url_template = "https://example.com/latest.zip"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, UpdaterError::Config(_)));
    }

    #[test]
    fn test_load_missing_and_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = UpdaterConfig::load(&path).unwrap();
        assert_eq!(config.paths.executable, "yuzu.exe");

        let mut config = config;
        config.paths.executable = "yuzu-cmd.exe".into();
        config.save(&path).unwrap();

        let loaded = UpdaterConfig::load(&path).unwrap();
        assert_eq!(loaded.paths.executable, "yuzu-cmd.exe");
    }
}
