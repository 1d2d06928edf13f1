//! Error types for Pineapple.

use thiserror::Error;

/// Core error type for every update and launch operation.
#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("Could not resolve the latest release: {0}")]
    Resolve(String),

    #[error("Download error: {url}")]
    Download {
        url: String,
        #[source]
        source: Box<UpdaterError>,
    },

    #[error("Transfer ended early: {received} of {expected} bytes")]
    IncompleteTransfer { received: u64, expected: u64 },

    #[error("Transfer stalled: no data for {0}s")]
    StalledTransfer(u64),

    #[error("Invalid release link: {0}")]
    InvalidRelease(String),

    #[error("Extraction failed: {0}")]
    Extract(String),

    #[error("No archive found in {0}")]
    NoArchive(String),

    #[error("Executable not found: {0}")]
    LaunchTargetMissing(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Downloading, please wait!")]
    DownloadInProgress,

    #[error("Another operation is already running")]
    Busy,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdaterError {
    /// Wrap any failure that happened while fetching `url`.
    pub fn download(url: impl Into<String>, source: UpdaterError) -> Self {
        Self::Download {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// The message shown to the user for this failure.
    ///
    /// Resolution failures collapse to a generic retry prompt; extraction
    /// failures surface their raw text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolve(_) | Self::InvalidRelease(_) => {
                "Check update fail, please try again!".to_string()
            }
            Self::Download { url, .. } => format!("Download error: {}", url),
            Self::Extract(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = UpdaterError::Resolve("timeout".into());
        assert_eq!(err.user_message(), "Check update fail, please try again!");

        let err = UpdaterError::download(
            "https://example.com/a.zip",
            UpdaterError::StalledTransfer(30),
        );
        assert_eq!(err.user_message(), "Download error: https://example.com/a.zip");

        let err = UpdaterError::Extract("invalid Zip archive".into());
        assert_eq!(err.user_message(), "invalid Zip archive");

        assert_eq!(
            UpdaterError::DownloadInProgress.user_message(),
            "Downloading, please wait!"
        );
    }
}
