//! Human-readable progress and summary text for the publisher CLI.
//!
//! Progress goes to stderr; [`crate::pipeline::run_pipeline`] takes the
//! writer explicitly so tests can capture it.

use crate::context::RunContext;
use crate::pipeline::RunSummary;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// One-line summary printed after a successful run.
///
/// # Examples
///
/// ```
/// use nightly_publisher::output::success_message;
///
/// assert_eq!(
///     success_message(3, "2026-10-14-03-00-00"),
///     "Published 3 package(s) under packages/2026-10-14-03-00-00"
/// );
/// ```
#[must_use]
pub fn success_message(count: usize, timestamp: impl std::fmt::Display) -> String {
    format!("Published {count} package(s) under packages/{timestamp}")
}

/// Description of the configuration a run is about to use.
#[must_use]
pub fn run_header(context: &RunContext) -> String {
    format!(
        "Run timestamp: {}\nSource: {}\nDestination: {}\nWorking directory: {}\n\
         Archive directory: {}\nArtifact base URL: {}",
        context.timestamp,
        context.source,
        context.destination,
        context.working_root,
        context.artifact_root,
        context.artifact_base_url,
    )
}

/// Listing of what a dry run would have uploaded, with archive digests.
#[must_use]
pub fn dry_run_report(summary: &RunSummary) -> String {
    let mut lines = vec!["Dry run - nothing was uploaded".to_owned()];
    if summary.planned.is_empty() {
        lines.push("No packages discovered.".to_owned());
        return lines.join("\n");
    }
    lines.push("Would publish:".to_owned());
    lines.extend(
        summary
            .planned
            .iter()
            .zip(&summary.artifacts)
            .map(|(location, artifact)| format!("  - {location} (sha256 {})", artifact.sha256)),
    );
    lines.join("\n")
}
