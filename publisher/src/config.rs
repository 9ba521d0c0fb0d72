//! Resolution of run settings from the CLI, a TOML file and defaults.
//!
//! Precedence is command line, then configuration file, then built-in
//! defaults. Credentials have no default: a run without both halves of the
//! pair fails before any stage starts.
//!
//! ```toml
//! username = "nightly-bot"
//! work_dir = "/var/tmp/nightly/temp"
//! packer = "native"
//!
//! [source]
//! branch = "next"
//!
//! [destination]
//! owner = "acme"
//! repo = "nightly-builds"
//! ```

use crate::cli::Cli;
use crate::context::{Credentials, RepoRef, RunContext};
use crate::discovery::TraversalPolicy;
use crate::error::{PublisherError, Result};
use crate::materialize::absolute_path;
use crate::packager::PackerKind;
use crate::timestamp::RunTimestamp;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;

/// Default directory the snapshot is extracted into.
pub const DEFAULT_WORK_DIR: &str = "temp";
/// Default directory archives are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "tarballs";

/// Repository fields that may be set in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Repository owner.
    pub owner: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// Branch name.
    pub branch: Option<String>,
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Artifact store account name.
    pub username: Option<String>,
    /// Artifact store password or token.
    pub password: Option<String>,
    /// Source repository.
    pub source: RepoConfig,
    /// Artifact repository.
    pub destination: RepoConfig,
    /// Sub-package directory inside the snapshot.
    pub packages_dir: Option<Utf8PathBuf>,
    /// Extraction directory.
    pub work_dir: Option<Utf8PathBuf>,
    /// Archive output directory.
    pub output_dir: Option<Utf8PathBuf>,
    /// Base URL written into rewritten dependencies.
    pub artifact_base_url: Option<String>,
    /// Install/build command.
    pub install_command: Option<String>,
    /// Archive packer.
    pub packer: Option<PackerKind>,
    /// Discovery traversal policy.
    pub on_traversal_error: Option<TraversalPolicy>,
}

impl FileConfig {
    /// Parse configuration text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Config`] if the text is not valid TOML or
    /// contains unknown keys.
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| PublisherError::Config {
            path: path.to_owned(),
            reason: e.message().to_owned(),
        })
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PublisherError::Config {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, path)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Context threaded through the pipeline.
    pub context: RunContext,
    /// Selected archive packer.
    pub packer: PackerKind,
}

/// Load the file named by `--config`, if any, and merge it with the CLI.
///
/// # Errors
///
/// Returns [`PublisherError::Config`] for an unreadable file, plus every
/// error of [`resolve`].
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    resolve(cli, file, RunTimestamp::now)
}

/// Merge CLI values over file values over defaults.
///
/// `now` supplies the run timestamp when none is given explicitly; it is
/// called at most once.
///
/// # Errors
///
/// Returns [`PublisherError::MissingCredential`] when the username or
/// password is missing, [`PublisherError::InvalidTimestamp`] for an
/// unusable `--timestamp`, or [`PublisherError::Filesystem`] if a relative
/// directory cannot be resolved against the current directory.
pub fn resolve(
    cli: &Cli,
    file: FileConfig,
    now: impl FnOnce() -> RunTimestamp,
) -> Result<Settings> {
    let username = cli
        .username
        .clone()
        .or(file.username)
        .ok_or(PublisherError::MissingCredential { flag: "username" })?;
    let password = cli
        .password
        .clone()
        .or(file.password)
        .ok_or(PublisherError::MissingCredential { flag: "password" })?;

    let timestamp = match &cli.timestamp {
        Some(token) => RunTimestamp::parse(token)?,
        None => now(),
    };

    let work_dir = cli
        .work_dir
        .clone()
        .or(file.work_dir)
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_WORK_DIR));
    let work_dir = absolute_path(&work_dir)?;
    let output_dir = cli
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
    let output_dir = absolute_path(&output_dir)?;

    let mut context = RunContext::new(
        timestamp,
        Credentials { username, password },
        work_dir,
        output_dir,
    );
    context.source = merge_repo(
        RepoRef::default_source(),
        [cli.owner.as_deref(), cli.repo.as_deref(), cli.branch.as_deref()],
        file.source,
    );
    context.destination = merge_repo(
        RepoRef::default_destination(),
        [
            cli.dest_owner.as_deref(),
            cli.dest_repo.as_deref(),
            cli.dest_branch.as_deref(),
        ],
        file.destination,
    );
    context.artifact_base_url = cli
        .artifact_base_url
        .clone()
        .or(file.artifact_base_url)
        .unwrap_or_else(|| context.destination.raw_packages_url());
    if let Some(dir) = cli.packages_dir.clone().or(file.packages_dir) {
        context.packages_subdir = dir;
    }
    if let Some(command) = cli.install_command.clone().or(file.install_command) {
        context.install_command = command;
    }
    context.traversal_policy = cli
        .on_traversal_error
        .or(file.on_traversal_error)
        .unwrap_or_default();
    context.dry_run = cli.dry_run;
    context.quiet = cli.quiet;

    Ok(Settings {
        context,
        packer: cli.packer.or(file.packer).unwrap_or_default(),
    })
}

/// Overlay `[owner, repo, branch]` CLI values and file values onto `base`.
fn merge_repo(base: RepoRef, cli: [Option<&str>; 3], file: RepoConfig) -> RepoRef {
    let [owner, repo, branch] = cli;
    let pick = |cli: Option<&str>, file: Option<String>, default: String| {
        cli.map(str::to_owned).or(file).unwrap_or(default)
    };
    RepoRef {
        owner: pick(owner, file.owner, base.owner),
        repo: pick(repo, file.repo, base.repo),
        branch: pick(branch, file.branch, base.branch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fixed_now() -> RunTimestamp {
        RunTimestamp::parse("2026-10-14-03-00-00").expect("valid timestamp")
    }

    fn cli_with_credentials() -> Cli {
        Cli {
            username: Some("bot".to_owned()),
            password: Some("token".to_owned()),
            ..Cli::default()
        }
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings =
            resolve(&cli_with_credentials(), FileConfig::default(), fixed_now).expect("resolve");
        let ctx = &settings.context;
        assert_eq!(ctx.source, RepoRef::default_source());
        assert_eq!(ctx.destination, RepoRef::default_destination());
        assert!(ctx.working_root.is_absolute());
        assert!(ctx.working_root.ends_with("temp"));
        assert!(ctx.artifact_root.is_absolute());
        assert!(ctx.artifact_root.ends_with("tarballs"));
        assert_eq!(ctx.install_command, "yarn");
        assert_eq!(ctx.timestamp.as_str(), "2026-10-14-03-00-00");
        assert_eq!(settings.packer, PackerKind::Yarn);
    }

    #[rstest]
    #[case::username(None, Some("token"), "username")]
    #[case::password(Some("bot"), None, "password")]
    fn missing_credential_is_reported(
        #[case] username: Option<&str>,
        #[case] password: Option<&str>,
        #[case] expected: &str,
    ) {
        let cli = Cli {
            username: username.map(str::to_owned),
            password: password.map(str::to_owned),
            ..Cli::default()
        };
        let err = resolve(&cli, FileConfig::default(), fixed_now).expect_err("should fail");
        assert!(
            matches!(err, PublisherError::MissingCredential { flag } if flag == expected),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn credentials_may_come_from_file() {
        let file = FileConfig {
            username: Some("file-bot".to_owned()),
            password: Some("file-token".to_owned()),
            ..FileConfig::default()
        };
        let settings = resolve(&Cli::default(), file, fixed_now).expect("resolve");
        assert_eq!(settings.context.credentials.username, "file-bot");
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let file = FileConfig::parse(
            r#"
                packer = "native"
                on_traversal_error = "fail"

                [source]
                owner = "file-owner"
                branch = "file-branch"
            "#,
            Utf8Path::new("nightly.toml"),
        )
        .expect("parse file");
        let cli = Cli {
            branch: Some("cli-branch".to_owned()),
            ..cli_with_credentials()
        };

        let settings = resolve(&cli, file, fixed_now).expect("resolve");
        let source = &settings.context.source;
        assert_eq!(source.owner, "file-owner");
        assert_eq!(source.repo, "resolve");
        assert_eq!(source.branch, "cli-branch");
        assert_eq!(settings.packer, PackerKind::Native);
        assert_eq!(settings.context.traversal_policy, TraversalPolicy::Fail);
    }

    #[test]
    fn base_url_follows_overridden_destination() {
        let cli = Cli {
            dest_owner: Some("acme".to_owned()),
            dest_repo: Some("nightly".to_owned()),
            dest_branch: Some("main".to_owned()),
            ..cli_with_credentials()
        };
        let settings = resolve(&cli, FileConfig::default(), fixed_now).expect("resolve");
        assert_eq!(
            settings.context.artifact_base_url,
            "https://raw.githubusercontent.com/acme/nightly/main/packages"
        );
    }

    #[test]
    fn explicit_base_url_wins() {
        let cli = Cli {
            artifact_base_url: Some("https://cdn.example/nightly".to_owned()),
            ..cli_with_credentials()
        };
        let settings = resolve(&cli, FileConfig::default(), fixed_now).expect("resolve");
        assert_eq!(settings.context.artifact_base_url, "https://cdn.example/nightly");
    }

    #[test]
    fn explicit_timestamp_skips_clock() {
        let cli = Cli {
            timestamp: Some("manual-7".to_owned()),
            ..cli_with_credentials()
        };
        let settings = resolve(&cli, FileConfig::default(), || {
            panic!("clock must not be read")
        })
        .expect("resolve");
        assert_eq!(settings.context.timestamp.as_str(), "manual-7");
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let cli = Cli {
            timestamp: Some("../escape".to_owned()),
            ..cli_with_credentials()
        };
        let result = resolve(&cli, FileConfig::default(), fixed_now);
        assert!(matches!(result, Err(PublisherError::InvalidTimestamp { .. })));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let result = FileConfig::parse("retries = 3", Utf8Path::new("nightly.toml"));
        assert!(matches!(result, Err(PublisherError::Config { .. })));
    }

    #[test]
    fn unknown_packer_in_file_is_rejected() {
        let result = FileConfig::parse(r#"packer = "npm""#, Utf8Path::new("nightly.toml"));
        assert!(matches!(result, Err(PublisherError::Config { .. })));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = FileConfig::load(Utf8Path::new("/nonexistent/nightly.toml"));
        assert!(matches!(result, Err(PublisherError::Config { .. })));
    }
}
