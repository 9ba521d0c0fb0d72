//! CLI argument definitions for the nightly publisher.
//!
//! Every setting is optional at parse time so that values from a
//! configuration file can fill the gaps; [`crate::config`] merges the two
//! and applies the built-in defaults.

use crate::discovery::TraversalPolicy;
use crate::packager::PackerKind;
use camino::Utf8PathBuf;
use clap::Parser;

/// Environment variable supplying the artifact store username.
pub const USERNAME_ENV: &str = "NIGHTLY_PUBLISHER_USERNAME";
/// Environment variable supplying the artifact store password or token.
pub const PASSWORD_ENV: &str = "NIGHTLY_PUBLISHER_PASSWORD";

/// Publish a nightly snapshot of a monorepo as timestamped package archives.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nightly-publisher")]
#[command(version, about)]
#[command(long_about = concat!(
    "Publish a nightly snapshot of a monorepo as timestamped package archives.\n\n",
    "The snapshot of the source branch is downloaded, extracted and built. Every ",
    "sub-package under the packages directory has its internal dependencies ",
    "rewritten to this run's archive URLs, is packed into <name>.tgz, and is ",
    "uploaded to the destination repository at packages/<timestamp>/<name>.tgz.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Publish the default branch:\n",
    "    $ nightly-publisher --username bot --password $TOKEN\n\n",
    "  Publish a feature branch without uploading:\n",
    "    $ nightly-publisher --branch next --dry-run --username bot --password x\n\n",
    "  Read settings from a file:\n",
    "    $ nightly-publisher --config nightly.toml",
))]
pub struct Cli {
    /// Artifact store account name.
    #[arg(long, env = USERNAME_ENV, hide_env_values = true)]
    pub username: Option<String>,

    /// Artifact store password or access token.
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// Owner of the source repository [default: reimagined].
    #[arg(long, value_name = "OWNER")]
    pub owner: Option<String>,

    /// Source repository name [default: resolve].
    #[arg(long, value_name = "REPO")]
    pub repo: Option<String>,

    /// Source branch to snapshot [default: dev].
    #[arg(long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Owner of the artifact repository [default: mrcheater].
    #[arg(long, value_name = "OWNER")]
    pub dest_owner: Option<String>,

    /// Artifact repository name [default: resolve-nightly-builds].
    #[arg(long, value_name = "REPO")]
    pub dest_repo: Option<String>,

    /// Artifact repository branch [default: master].
    #[arg(long, value_name = "BRANCH")]
    pub dest_branch: Option<String>,

    /// Sub-package directory inside the snapshot [default: packages].
    #[arg(long, value_name = "DIR")]
    pub packages_dir: Option<Utf8PathBuf>,

    /// Directory the snapshot is extracted into; destroyed on every run [default: ./temp].
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<Utf8PathBuf>,

    /// Directory archives are written to; destroyed on every run [default: ./tarballs].
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Base URL written into rewritten dependencies [default: raw URL of the artifact repository].
    #[arg(long, value_name = "URL")]
    pub artifact_base_url: Option<String>,

    /// Install/build command run in the snapshot root [default: yarn].
    #[arg(long, value_name = "COMMAND")]
    pub install_command: Option<String>,

    /// Archive packer: yarn or native [default: yarn].
    #[arg(long, value_name = "PACKER")]
    pub packer: Option<PackerKind>,

    /// Unreadable directories during discovery: skip or fail [default: skip].
    #[arg(long, value_name = "POLICY")]
    pub on_traversal_error: Option<TraversalPolicy>,

    /// Use an explicit run timestamp instead of the current time.
    #[arg(long, value_name = "TOKEN")]
    pub timestamp: Option<String>,

    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Run every stage except the upload.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter for the selected verbosity.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::cli::Cli;
    ///
    /// let cli = Cli { verbosity: 1, ..Cli::default() };
    /// assert_eq!(cli.log_level(), "info");
    /// ```
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbosity) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
