//! Uploading archives to the artifact repository.
//!
//! Archives are base64 encoded in memory and created one by one through the
//! repository contents API. The first failed upload stops the run; archives
//! already uploaded stay where they are.

use crate::context::{Credentials, PUBLISH_PREFIX, RepoRef};
use crate::error::{PublisherError, Result};
use crate::packager::Artifact;
use crate::timestamp::RunTimestamp;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use camino::Utf8Path;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::fs;

/// Commit message recorded for every uploaded archive.
pub const COMMIT_MESSAGE: &str = "Nightly builds update";

/// Default API host of the artifact store.
pub const DEFAULT_API_HOST: &str = "https://api.github.com";

/// Identifies the client to the contents API.
const USER_AGENT: &str = concat!("nightly-publisher/", env!("CARGO_PKG_VERSION"));

/// Destination path of an archive within the artifact repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublishedLocation(String);

impl PublishedLocation {
    /// `packages/<timestamp>/<file_name>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::publish::PublishedLocation;
    /// use nightly_publisher::timestamp::RunTimestamp;
    ///
    /// let ts = RunTimestamp::parse("2026-10-14-03-00-00")?;
    /// let location = PublishedLocation::new(&ts, "resolve-core.tgz");
    /// assert_eq!(location.as_str(), "packages/2026-10-14-03-00-00/resolve-core.tgz");
    /// # Ok::<(), nightly_publisher::error::PublisherError>(())
    /// ```
    #[must_use]
    pub fn new(timestamp: &RunTimestamp, file_name: &str) -> Self {
        Self(format!("{PUBLISH_PREFIX}/{timestamp}/{file_name}"))
    }

    /// Get the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublishedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to create one file in the artifact repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileRequest {
    /// Repository and branch receiving the file.
    pub destination: RepoRef,
    /// Path of the new file.
    pub path: PublishedLocation,
    /// Base64 encoded file content.
    pub content: String,
    /// Commit message.
    pub message: String,
}

/// Remote storage accepting new files.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactStore {
    /// Create a file in the artifact repository.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Publish`] if the store rejects the request
    /// or cannot be reached.
    fn create_file(&self, request: &CreateFileRequest) -> Result<()>;
}

/// JSON body of the contents API `PUT` request.
#[derive(Debug, Serialize)]
struct ContentsPayload<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
}

/// Artifact store backed by the GitHub repository contents API.
pub struct GithubContentsStore {
    agent: ureq::Agent,
    api_host: String,
    authorization: String,
}

impl GithubContentsStore {
    /// Create a store authenticating with HTTP basic credentials.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self::with_api_host(credentials, DEFAULT_API_HOST)
    }

    /// Create a store for a custom API host.
    #[must_use]
    pub fn with_api_host(credentials: &Credentials, api_host: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_host: api_host.into(),
            authorization: basic_authorization(credentials),
        }
    }

    /// URL of the contents endpoint for `request`.
    #[must_use]
    pub fn contents_url(&self, request: &CreateFileRequest) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_host.trim_end_matches('/'),
            request.destination.owner,
            request.destination.repo,
            request.path
        )
    }
}

impl ArtifactStore for GithubContentsStore {
    fn create_file(&self, request: &CreateFileRequest) -> Result<()> {
        let url = self.contents_url(request);
        let payload = ContentsPayload {
            message: &request.message,
            content: &request.content,
            branch: &request.destination.branch,
        };
        self.agent
            .put(&url)
            .header("Authorization", &self.authorization)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .send_json(&payload)
            .map_err(|e| PublisherError::Publish {
                path: request.path.to_string(),
                reason: describe_ureq_error(&e),
            })?;
        Ok(())
    }
}

/// `Authorization` header value for HTTP basic auth.
fn basic_authorization(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", BASE64.encode(pair))
}

fn describe_ureq_error(err: &ureq::Error) -> String {
    match err {
        ureq::Error::StatusCode(401) => "authentication rejected (HTTP 401)".to_owned(),
        ureq::Error::StatusCode(422) => {
            "file already exists or request was invalid (HTTP 422)".to_owned()
        }
        other => other.to_string(),
    }
}

/// Uploads produced archives in order.
pub struct Publisher<'a> {
    store: &'a dyn ArtifactStore,
    destination: &'a RepoRef,
    artifact_root: &'a Utf8Path,
}

impl<'a> Publisher<'a> {
    /// Create a publisher reading archives from `artifact_root`.
    #[must_use]
    pub fn new(
        store: &'a dyn ArtifactStore,
        destination: &'a RepoRef,
        artifact_root: &'a Utf8Path,
    ) -> Self {
        Self {
            store,
            destination,
            artifact_root,
        }
    }

    /// Build the upload request for one archive.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Publish`] if the archive cannot be read.
    pub fn request_for(
        &self,
        timestamp: &RunTimestamp,
        artifact: &Artifact,
    ) -> Result<CreateFileRequest> {
        let path = PublishedLocation::new(timestamp, &artifact.file_name);
        let archive_path = self.artifact_root.join(&artifact.file_name);
        let bytes = fs::read(&archive_path).map_err(|e| PublisherError::Publish {
            path: path.to_string(),
            reason: format!("cannot read {archive_path}: {e}"),
        })?;
        Ok(CreateFileRequest {
            destination: self.destination.clone(),
            path,
            content: BASE64.encode(bytes),
            message: COMMIT_MESSAGE.to_owned(),
        })
    }

    /// Upload every archive in the given order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`PublisherError::Publish`]; later archives are not
    /// attempted and earlier uploads are not rolled back.
    pub fn publish_all(
        &self,
        timestamp: &RunTimestamp,
        artifacts: &[Artifact],
    ) -> Result<Vec<PublishedLocation>> {
        let mut published = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let request = self.request_for(timestamp, artifact)?;
            debug!(
                "uploading {} ({} base64 bytes) to {}",
                artifact.file_name,
                request.content.len(),
                self.destination
            );
            self.store.create_file(&request)?;
            info!("published {}", request.path);
            published.push(request.path);
        }
        Ok(published)
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
