//! Nightly publisher CLI entrypoint.
//!
//! This binary fetches a branch snapshot, builds it, rewrites and packs every
//! sub-package, and uploads the archives under a timestamped path.

use clap::Parser;
use nightly_publisher::builder::SystemCommandExecutor;
use nightly_publisher::cli::Cli;
use nightly_publisher::config::{Settings, load_settings};
use nightly_publisher::error::Result;
use nightly_publisher::output::{dry_run_report, run_header, success_message, write_stderr_line};
use nightly_publisher::packager::{ArchivePacker, PackerKind, TarballPacker, ToolPacker};
use nightly_publisher::pipeline::{Collaborators, RunSummary, run_pipeline};
use nightly_publisher::publish::GithubContentsStore;
use nightly_publisher::source::HttpSnapshotFetcher;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Route `log` records to stderr, honouring `RUST_LOG` when set.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    // Credentials and settings are checked before any stage touches the
    // network or the filesystem.
    let settings = load_settings(cli)?;
    let context = &settings.context;
    if !context.quiet {
        write_stderr_line(stderr, run_header(context));
        write_stderr_line(stderr, "");
    }

    let fetcher = HttpSnapshotFetcher::new();
    let executor = SystemCommandExecutor::forwarding();
    let store = GithubContentsStore::new(&context.credentials);
    let tool_packer = ToolPacker::yarn(&executor);
    let packer = select_packer(&settings, &tool_packer);

    let collaborators = Collaborators {
        fetcher: &fetcher,
        executor: &executor,
        packer,
        store: &store,
    };
    let summary = run_pipeline(context, &collaborators, stderr)?;
    report(&settings, &summary, stderr);
    Ok(())
}

fn select_packer<'a>(settings: &Settings, tool: &'a ToolPacker<'a>) -> &'a dyn ArchivePacker {
    match settings.packer {
        PackerKind::Yarn => tool,
        PackerKind::Native => &TarballPacker,
    }
}

fn report(settings: &Settings, summary: &RunSummary, stderr: &mut dyn Write) {
    if settings.context.quiet {
        return;
    }
    write_stderr_line(stderr, "");
    if settings.context.dry_run {
        write_stderr_line(stderr, dry_run_report(summary));
    } else {
        write_stderr_line(
            stderr,
            success_message(summary.published.len(), &summary.timestamp),
        );
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightly_publisher::error::PublisherError;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = PublisherError::MissingCredential { flag: "password" };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("missing required credential: pass --password"));
    }

    #[test]
    fn run_without_credentials_fails_before_any_stage() {
        let cli = Cli {
            username: None,
            password: None,
            ..Cli::default()
        };
        let mut stderr = Vec::new();
        let result = run(&cli, &mut stderr);
        assert!(matches!(
            result,
            Err(PublisherError::MissingCredential { flag: "username" })
        ));
        assert!(stderr.is_empty());
    }
}
