//! Release data model and asset derivation.

use std::path::{Path, PathBuf};

use crate::error::{Result, UpdaterError};

/// The newest entry found on the version index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub display_name: String,
    pub detail_url: String,
}

/// Where a release's archive lives remotely and where it lands locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub tag: String,
    pub asset_url: String,
    pub local_path: PathBuf,
}

/// Derives download targets from release candidates using a URL template.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    template: String,
    archive_dir: PathBuf,
}

impl AssetLocator {
    pub fn new(template: impl Into<String>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Build the download target for `candidate`.
    ///
    /// The tag is the last path segment of the detail link. A link with no
    /// `/` is taken whole; a trailing `/` is ignored.
    pub fn locate(&self, candidate: &ReleaseCandidate) -> Result<DownloadTarget> {
        let tag = release_tag(&candidate.detail_url)
            .ok_or_else(|| UpdaterError::InvalidRelease(candidate.detail_url.clone()))?;

        let asset_url = self.template.replace("{tag}", tag);
        let file_name = asset_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| UpdaterError::InvalidRelease(asset_url.clone()))?;

        Ok(DownloadTarget {
            tag: tag.to_string(),
            local_path: self.archive_dir.join(file_name),
            asset_url,
        })
    }
}

/// Trailing path segment of a release link.
pub fn release_tag(detail_url: &str) -> Option<&str> {
    let trimmed = detail_url.trim().trim_end_matches('/');
    let tag = match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };
    (!tag.is_empty()).then_some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str =
        "https://github.com/pineappleEA/pineapple-src/releases/download/{tag}/Windows-Yuzu-{tag}.zip";

    fn candidate(url: &str) -> ReleaseCandidate {
        ReleaseCandidate {
            display_name: "EA 1234".into(),
            detail_url: url.into(),
        }
    }

    #[test]
    fn test_tag_derivation() {
        let locator = AssetLocator::new(TEMPLATE, "/tmp/yuzu");
        let target = locator
            .locate(&candidate(
                "https://github.com/pineappleEA/pineapple-src/releases/tag/EA-1234",
            ))
            .unwrap();

        assert_eq!(target.tag, "EA-1234");
        assert_eq!(
            target.asset_url,
            "https://github.com/pineappleEA/pineapple-src/releases/download/EA-1234/Windows-Yuzu-EA-1234.zip"
        );
        assert_eq!(
            target.local_path,
            PathBuf::from("/tmp/yuzu/Windows-Yuzu-EA-1234.zip")
        );
    }

    #[test]
    fn test_release_tag_edge_cases() {
        assert_eq!(release_tag("EA-99"), Some("EA-99"));
        assert_eq!(release_tag("https://host/releases/tag/EA-7/"), Some("EA-7"));
        assert_eq!(release_tag("https://host/"), Some("host"));
        assert_eq!(release_tag(""), None);
        assert_eq!(release_tag("/"), None);
    }

    #[test]
    fn test_empty_link_is_invalid() {
        let locator = AssetLocator::new(TEMPLATE, "/tmp/yuzu");
        let err = locator.locate(&candidate("  ")).unwrap_err();
        assert!(matches!(err, UpdaterError::InvalidRelease(_)));
    }
}
