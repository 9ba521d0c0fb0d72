//! Rewriting internal cross-dependencies to this run's artifact URLs.
//!
//! For every discovered package the `dependencies`, `devDependencies` and
//! `peerDependencies` sections are scanned. An entry whose key equals the
//! name of a discovered package gets the specifier
//! `<base>/<timestamp>/<key>.tgz`; every other entry is left untouched.
//! Manifests without a matching entry are not written back.

use crate::error::Result;
use crate::manifest::{DependencySection, Manifest};
use crate::package::{PackageName, PackageSet};
use crate::timestamp::RunTimestamp;
use camino::Utf8Path;
use log::{debug, info};
use serde_json::Value;

/// Download URL of a package's archive for one run.
///
/// # Examples
///
/// ```
/// use nightly_publisher::rewrite::artifact_url;
/// use nightly_publisher::timestamp::RunTimestamp;
///
/// let ts = RunTimestamp::parse("2026-10-14-03-00-00")?;
/// assert_eq!(
///     artifact_url("https://cdn.example/packages/", &ts, "resolve-core"),
///     "https://cdn.example/packages/2026-10-14-03-00-00/resolve-core.tgz"
/// );
/// # Ok::<(), nightly_publisher::error::PublisherError>(())
/// ```
#[must_use]
pub fn artifact_url(base_url: &str, timestamp: &RunTimestamp, name: &str) -> String {
    format!("{}/{timestamp}/{name}.tgz", base_url.trim_end_matches('/'))
}

/// One rewritten dependency entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDependency {
    /// Package whose manifest was changed.
    pub package: PackageName,
    /// Section holding the entry.
    pub section: DependencySection,
    /// Key of the entry.
    pub dependency: String,
    /// Specifier before rewriting.
    pub previous: Value,
    /// Specifier after rewriting.
    pub url: String,
}

/// Every entry rewritten during one run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Rewritten entries.
    pub rewritten: Vec<RewrittenDependency>,
    /// Number of manifests written back.
    pub manifests_written: usize,
}

impl RewriteReport {
    /// Whether no entry was rewritten.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty()
    }
}

/// Rewrite internal references in one manifest in memory.
///
/// Returns the rewritten entries, in section then key order.
///
/// # Errors
///
/// Returns [`crate::error::PublisherError::ManifestParse`] if a dependency
/// section is present but not an object.
pub fn rewrite_manifest(
    manifest: &mut Manifest,
    package: &PackageName,
    packages: &PackageSet,
    base_url: &str,
    timestamp: &RunTimestamp,
    path: &Utf8Path,
) -> Result<Vec<RewrittenDependency>> {
    let mut rewritten = Vec::new();
    for section in DependencySection::ALL {
        let Some(entries) = manifest.section_mut(section, path)? else {
            continue;
        };
        for (dependency, specifier) in entries.iter_mut() {
            if !packages.contains(dependency) {
                continue;
            }
            let url = artifact_url(base_url, timestamp, dependency);
            let previous = std::mem::replace(specifier, Value::String(url.clone()));
            rewritten.push(RewrittenDependency {
                package: package.clone(),
                section,
                dependency: dependency.clone(),
                previous,
                url,
            });
        }
    }
    Ok(rewritten)
}

/// Rewrite every discovered package's manifest on disk.
///
/// # Errors
///
/// Returns [`crate::error::PublisherError::ManifestParse`] if a manifest
/// cannot be parsed, or [`crate::error::PublisherError::Filesystem`] if one
/// cannot be read or written back. Manifests processed before the failure
/// keep their rewritten contents.
pub fn rewrite_packages(
    packages: &PackageSet,
    base_url: &str,
    timestamp: &RunTimestamp,
) -> Result<RewriteReport> {
    let mut report = RewriteReport::default();
    for entry in packages {
        let path = entry.manifest_path();
        let mut manifest = Manifest::load(&path)?;
        let changes = rewrite_manifest(
            &mut manifest,
            &entry.name,
            packages,
            base_url,
            timestamp,
            &path,
        )?;
        if changes.is_empty() {
            continue;
        }
        manifest.save(&path)?;
        for change in &changes {
            debug!(
                "{}: {}.{} {} -> {}",
                entry.name, change.section, change.dependency, change.previous, change.url
            );
        }
        report.manifests_written += 1;
        report.rewritten.extend(changes);
    }
    info!(
        "rewrote {} internal reference(s) across {} manifest(s)",
        report.rewritten.len(),
        report.manifests_written
    );
    Ok(report)
}
