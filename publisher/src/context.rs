//! Per-run context threaded through every pipeline stage.
//!
//! All paths, credentials, and the run timestamp travel in a [`RunContext`]
//! value instead of process-wide state, so several pipelines can run side by
//! side against separate directories (as the tests do).

use crate::builder::DEFAULT_INSTALL_COMMAND;
use crate::discovery::TraversalPolicy;
use crate::timestamp::RunTimestamp;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Default owner of the source repository.
pub const DEFAULT_SOURCE_OWNER: &str = "reimagined";
/// Default source repository name.
pub const DEFAULT_SOURCE_REPO: &str = "resolve";
/// Default source branch.
pub const DEFAULT_SOURCE_BRANCH: &str = "dev";

/// Default owner of the artifact repository.
pub const DEFAULT_DEST_OWNER: &str = "mrcheater";
/// Default artifact repository name.
pub const DEFAULT_DEST_REPO: &str = "resolve-nightly-builds";
/// Default artifact repository branch.
pub const DEFAULT_DEST_BRANCH: &str = "master";

/// Directory, relative to the snapshot root, that holds the sub-packages.
pub const DEFAULT_PACKAGES_SUBDIR: &str = "packages";

/// Prefix of every published path in the artifact repository.
pub const PUBLISH_PREFIX: &str = "packages";

/// Host serving raw file contents of the artifact repository.
const RAW_CONTENT_HOST: &str = "https://raw.githubusercontent.com";

/// A branch of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch name.
    pub branch: String,
}

impl RepoRef {
    /// Create a repository reference.
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// The default source branch, `reimagined/resolve@dev`.
    #[must_use]
    pub fn default_source() -> Self {
        Self::new(DEFAULT_SOURCE_OWNER, DEFAULT_SOURCE_REPO, DEFAULT_SOURCE_BRANCH)
    }

    /// The default artifact repository, `mrcheater/resolve-nightly-builds@master`.
    #[must_use]
    pub fn default_destination() -> Self {
        Self::new(DEFAULT_DEST_OWNER, DEFAULT_DEST_REPO, DEFAULT_DEST_BRANCH)
    }

    /// Base URL under which published archives become downloadable.
    ///
    /// Files stored at `packages/<ts>/<file>` in this repository are served
    /// at `<base>/<ts>/<file>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::context::RepoRef;
    ///
    /// let dest = RepoRef::default_destination();
    /// assert_eq!(
    ///     dest.raw_packages_url(),
    ///     "https://raw.githubusercontent.com/mrcheater/resolve-nightly-builds/master/packages"
    /// );
    /// ```
    #[must_use]
    pub fn raw_packages_url(&self) -> String {
        format!(
            "{RAW_CONTENT_HOST}/{}/{}/{}/{PUBLISH_PREFIX}",
            self.owner, self.repo, self.branch
        )
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// Credential pair for the artifact store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Password or personal access token.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Token namespacing this run's URLs and published paths.
    pub timestamp: RunTimestamp,
    /// Branch whose snapshot is published.
    pub source: RepoRef,
    /// Repository receiving the archives.
    pub destination: RepoRef,
    /// Credentials for the artifact store.
    pub credentials: Credentials,
    /// Directory the snapshot is extracted into. Destroyed at run start.
    pub working_root: Utf8PathBuf,
    /// Directory the archives are written to. Destroyed before packing.
    pub artifact_root: Utf8PathBuf,
    /// Sub-package container directory, relative to the snapshot root.
    pub packages_subdir: Utf8PathBuf,
    /// Base URL embedded into rewritten dependency specifiers.
    pub artifact_base_url: String,
    /// Command line run in the snapshot root before discovery.
    pub install_command: String,
    /// Behaviour when a directory cannot be read during discovery.
    pub traversal_policy: TraversalPolicy,
    /// Skip the upload stage and only report what would be published.
    pub dry_run: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

impl RunContext {
    /// Create a context with default repositories and layout.
    ///
    /// The artifact base URL is derived from the destination repository so
    /// that rewritten URLs point at the published files.
    #[must_use]
    pub fn new(
        timestamp: RunTimestamp,
        credentials: Credentials,
        working_root: Utf8PathBuf,
        artifact_root: Utf8PathBuf,
    ) -> Self {
        let destination = RepoRef::default_destination();
        Self {
            timestamp,
            source: RepoRef::default_source(),
            artifact_base_url: destination.raw_packages_url(),
            destination,
            credentials,
            working_root,
            artifact_root,
            packages_subdir: Utf8PathBuf::from(DEFAULT_PACKAGES_SUBDIR),
            install_command: DEFAULT_INSTALL_COMMAND.to_owned(),
            traversal_policy: TraversalPolicy::default(),
            dry_run: false,
            quiet: false,
        }
    }

    /// Resolve the packages container inside an extracted snapshot.
    #[must_use]
    pub fn packages_root(&self, snapshot_root: &Utf8Path) -> Utf8PathBuf {
        snapshot_root.join(&self.packages_subdir)
    }
}
