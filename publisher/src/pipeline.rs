//! End-to-end run orchestration.
//!
//! A run moves strictly through Fetch, Materialize, Build, Discover, Rewrite,
//! Package and Publish. Each stage completes before the next starts and the
//! first error ends the run. External effects go through the capabilities
//! bundled in [`Collaborators`].

use crate::builder::{Builder, CommandExecutor};
use crate::context::RunContext;
use crate::discovery::discover_packages;
use crate::error::Result;
use crate::materialize::materialize;
use crate::output::write_stderr_line;
use crate::package::PackageName;
use crate::packager::{ArchivePacker, Artifact, Packager};
use crate::publish::{ArtifactStore, PublishedLocation, Publisher};
use crate::rewrite::{RewriteReport, rewrite_packages};
use crate::source::SnapshotFetcher;
use crate::timestamp::RunTimestamp;
use camino::Utf8PathBuf;
use log::info;
use std::io::Write;

/// External capabilities used by a run.
pub struct Collaborators<'a> {
    /// Downloads the branch snapshot.
    pub fetcher: &'a dyn SnapshotFetcher,
    /// Runs the install/build step.
    pub executor: &'a dyn CommandExecutor,
    /// Produces one archive per package.
    pub packer: &'a dyn ArchivePacker,
    /// Receives the archives.
    pub store: &'a dyn ArtifactStore,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// The run's timestamp.
    pub timestamp: RunTimestamp,
    /// Extracted snapshot root, once materialized.
    pub snapshot_root: Option<Utf8PathBuf>,
    /// Discovered packages in discovery order.
    pub packages: Vec<PackageName>,
    /// Internal references rewritten.
    pub rewrite: RewriteReport,
    /// Archives produced.
    pub artifacts: Vec<Artifact>,
    /// Paths uploaded to the artifact store.
    pub published: Vec<PublishedLocation>,
    /// Paths a dry run would have uploaded.
    pub planned: Vec<PublishedLocation>,
}

impl RunSummary {
    /// An empty summary for a run that has not started.
    #[must_use]
    pub fn new(timestamp: RunTimestamp) -> Self {
        Self {
            timestamp,
            snapshot_root: None,
            packages: Vec::new(),
            rewrite: RewriteReport::default(),
            artifacts: Vec::new(),
            published: Vec::new(),
            planned: Vec::new(),
        }
    }
}

/// Execute one complete run.
///
/// Progress lines are written to `stderr` unless the context is quiet. In
/// dry-run mode every stage except the upload runs, and the paths that
/// would have been uploaded are returned in [`RunSummary::planned`].
///
/// # Errors
///
/// Returns the first error raised by any stage. Work done by earlier stages
/// (extracted tree, rewritten manifests, produced archives, uploaded files)
/// is left in place.
pub fn run_pipeline(
    context: &RunContext,
    collaborators: &Collaborators<'_>,
    stderr: &mut dyn Write,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(context.timestamp.clone());
    progress(context, stderr, format!("Fetching snapshot of {}...", context.source));
    let bytes = collaborators.fetcher.fetch(&context.source)?;
    info!("fetched {} byte snapshot of {}", bytes.len(), context.source);

    let snapshot_root = materialize(&bytes, &context.working_root)?;
    drop(bytes);
    progress(context, stderr, format!("Extracted snapshot to {snapshot_root}"));
    summary.snapshot_root = Some(snapshot_root.clone());

    progress(context, stderr, format!("Running `{}`...", context.install_command));
    Builder::new(collaborators.executor, context.install_command.as_str())
        .install(&snapshot_root)?;

    let packages = discover_packages(
        &context.packages_root(&snapshot_root),
        context.traversal_policy,
    )?;
    progress(context, stderr, format!("Discovered {} package(s)", packages.len()));
    summary.packages = packages.iter().map(|entry| entry.name.clone()).collect();

    summary.rewrite = rewrite_packages(&packages, &context.artifact_base_url, &context.timestamp)?;
    progress(
        context,
        stderr,
        format!(
            "Rewrote {} internal dependency reference(s)",
            summary.rewrite.rewritten.len()
        ),
    );

    let packager = Packager::new(collaborators.packer, context.artifact_root.clone());
    summary.artifacts = packager.pack_all(&packages)?;
    progress(
        context,
        stderr,
        format!(
            "Packed {} archive(s) into {}",
            summary.artifacts.len(),
            context.artifact_root
        ),
    );

    if context.dry_run {
        summary.planned = summary
            .artifacts
            .iter()
            .map(|artifact| PublishedLocation::new(&context.timestamp, &artifact.file_name))
            .collect();
        info!("dry run: skipped {} upload(s)", summary.planned.len());
        return Ok(summary);
    }

    let publisher = Publisher::new(
        collaborators.store,
        &context.destination,
        &context.artifact_root,
    );
    progress(
        context,
        stderr,
        format!(
            "Publishing {} archive(s) to {}...",
            summary.artifacts.len(),
            context.destination
        ),
    );
    summary.published = publisher.publish_all(&context.timestamp, &summary.artifacts)?;
    Ok(summary)
}

fn progress(context: &RunContext, stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if !context.quiet {
        write_stderr_line(stderr, message);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
