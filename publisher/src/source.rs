//! Snapshot retrieval from the source host.
//!
//! Provides a trait-based abstraction for downloading a branch snapshot as
//! zip bytes, enabling dependency injection for testing.

use crate::context::RepoRef;
use crate::error::{PublisherError, Result};
use log::debug;

/// Host serving branch snapshots as zip archives.
pub const DEFAULT_SNAPSHOT_HOST: &str = "https://codeload.github.com";

/// Trait for retrieving the raw bytes of a branch snapshot.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotFetcher {
    /// Download the complete snapshot for `source`.
    ///
    /// Bytes are only returned once the whole transfer has completed.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Transport`] on any connection, HTTP, or body
    /// read failure.
    fn fetch(&self, source: &RepoRef) -> Result<Vec<u8>>;
}

/// HTTP-based fetcher using `ureq`.
pub struct HttpSnapshotFetcher {
    agent: ureq::Agent,
    host: String,
}

impl HttpSnapshotFetcher {
    /// Create a fetcher for the default snapshot host.
    #[must_use]
    pub fn new() -> Self {
        Self::with_host(DEFAULT_SNAPSHOT_HOST)
    }

    /// Create a fetcher for a custom snapshot host.
    #[must_use]
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            host: host.into(),
        }
    }

    /// Construct the snapshot download URL for a branch.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::context::RepoRef;
    /// use nightly_publisher::source::HttpSnapshotFetcher;
    ///
    /// let fetcher = HttpSnapshotFetcher::new();
    /// let url = fetcher.snapshot_url(&RepoRef::default_source());
    /// assert_eq!(url, "https://codeload.github.com/reimagined/resolve/zip/dev");
    /// ```
    #[must_use]
    pub fn snapshot_url(&self, source: &RepoRef) -> String {
        format!(
            "{}/{}/{}/zip/{}",
            self.host.trim_end_matches('/'),
            source.owner,
            source.repo,
            source.branch
        )
    }
}

impl Default for HttpSnapshotFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFetcher for HttpSnapshotFetcher {
    fn fetch(&self, source: &RepoRef) -> Result<Vec<u8>> {
        let url = self.snapshot_url(source);
        debug!("downloading snapshot {url}");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(&url, &e))?;
        let bytes = response
            .into_body()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| map_ureq_error(&url, &e))?;
        debug!("downloaded {} byte(s) from {url}", bytes.len());
        Ok(bytes)
    }
}

/// Map a ureq error to a [`PublisherError::Transport`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> PublisherError {
    let reason = match err {
        ureq::Error::StatusCode(404) => "branch snapshot not found (HTTP 404)".to_owned(),
        other => other.to_string(),
    };
    PublisherError::Transport {
        url: url.to_owned(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_url_uses_owner_repo_branch() {
        let fetcher = HttpSnapshotFetcher::with_host("https://codeload.example.test/");
        let url = fetcher.snapshot_url(&RepoRef::new("acme", "mono", "nightly"));
        assert_eq!(url, "https://codeload.example.test/acme/mono/zip/nightly");
    }

    #[test]
    fn map_ureq_error_reports_missing_branch() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/zip/dev", &err);
        match mapped {
            PublisherError::Transport { url, reason } => {
                assert!(url.ends_with("/zip/dev"));
                assert!(reason.contains("404"));
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn map_ureq_error_keeps_other_failures() {
        let err = ureq::Error::StatusCode(502);
        let mapped = map_ureq_error("https://example.test/zip/dev", &err);
        assert!(matches!(mapped, PublisherError::Transport { .. }));
    }
}
