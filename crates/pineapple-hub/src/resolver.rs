//! Version resolver — find the newest release on the HTML index page.

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use pineapple_core::error::{Result, UpdaterError};
use pineapple_core::release::ReleaseCandidate;

/// Fetches the release index and picks its first (newest) entry.
pub struct VersionResolver {
    client: Client,
    index_url: String,
    selector: String,
}

impl VersionResolver {
    pub fn new(
        index_url: impl Into<String>,
        selector: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| UpdaterError::Resolve(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            index_url: index_url.into(),
            selector: selector.into(),
        })
    }

    /// Fetch the index and return its newest release. No retries.
    pub async fn resolve(&self) -> Result<ReleaseCandidate> {
        debug!("Fetching release index {}", self.index_url);

        let html = self
            .client
            .get(&self.index_url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| UpdaterError::Resolve(e.to_string()))?
            .text()
            .await
            .map_err(|e| UpdaterError::Resolve(e.to_string()))?;

        let release = parse_index(&html, &self.selector)?;
        info!("Latest release: {} ({})", release.display_name, release.detail_url);
        Ok(release)
    }
}

/// Select the first matching anchor in `html`.
///
/// An empty selection, or a first anchor without text or link, is a failure.
pub fn parse_index(html: &str, selector: &str) -> Result<ReleaseCandidate> {
    let selector = Selector::parse(selector)
        .map_err(|e| UpdaterError::Resolve(format!("Bad selector '{}': {}", selector, e)))?;

    let document = Html::parse_document(html);
    let first = document
        .select(&selector)
        .next()
        .ok_or_else(|| UpdaterError::Resolve("No releases listed on index page".into()))?;

    let display_name = first
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let detail_url = first.value().attr("href").unwrap_or("").trim().to_string();

    if display_name.is_empty() || detail_url.is_empty() {
        return Err(UpdaterError::Resolve(
            "Newest index entry has no name or link".into(),
        ));
    }

    Ok(ReleaseCandidate {
        display_name,
        detail_url,
    })
}
