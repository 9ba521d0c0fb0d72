//! Error types for the nightly publisher.
//!
//! Every pipeline stage reports failures through [`PublisherError`]. The
//! propagation policy is fail-fast: the first error aborts the run and is
//! reported by the binary with a non-zero exit code.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during a nightly publishing run.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// The snapshot could not be downloaded from the source host.
    #[error("failed to fetch snapshot from {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// Description of the network or HTTP failure.
        reason: String,
    },

    /// The snapshot archive could not be read or extracted.
    #[error("failed to extract snapshot: {reason}")]
    Extraction {
        /// Description of the archive problem.
        reason: String,
    },

    /// A filesystem operation on the working or output tree failed.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Path the operation was acting on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The install/build step exited unsuccessfully.
    #[error("build command `{command}` failed in {directory}: {reason}")]
    Build {
        /// The command line that was run.
        command: String,
        /// The working directory of the command.
        directory: Utf8PathBuf,
        /// Exit status or captured stderr.
        reason: String,
    },

    /// A `package.json` could not be interpreted.
    #[error("invalid manifest at {path}: {reason}")]
    ManifestParse {
        /// Path to the offending manifest.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// Two discovered packages declare the same name.
    #[error("package {name} is declared by both {first} and {second}")]
    DuplicatePackage {
        /// The colliding package name.
        name: String,
        /// Directory of the first package with this name.
        first: Utf8PathBuf,
        /// Directory of the second package with this name.
        second: Utf8PathBuf,
    },

    /// Packing a sub-package into an archive failed.
    #[error("packaging failed for {package}: {reason}")]
    Packaging {
        /// Name of the package being packed.
        package: String,
        /// Description of the failure.
        reason: String,
    },

    /// Uploading an archive to the artifact store failed.
    #[error("publishing {path} failed: {reason}")]
    Publish {
        /// Destination path within the artifact repository.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// A required credential was not supplied.
    #[error("missing required credential: pass --{flag}")]
    MissingCredential {
        /// The command-line flag that supplies the credential.
        flag: &'static str,
    },

    /// An explicit run timestamp cannot be used as a path segment.
    #[error("invalid run timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected token.
        value: String,
        /// Why the token was rejected.
        reason: &'static str,
    },

    /// The configuration file could not be loaded.
    #[error("invalid configuration file {path}: {reason}")]
    Config {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Test stub received an unexpected or mismatched invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl PublisherError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn filesystem(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using [`PublisherError`].
pub type Result<T> = std::result::Result<T, PublisherError>;
