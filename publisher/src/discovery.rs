//! Sub-package discovery.
//!
//! Walks the packages container of an extracted snapshot and records every
//! directory holding a `package.json`. A package directory is a leaf: its
//! own subdirectories are never scanned, so nested manifests (fixtures,
//! templates, installed `node_modules`) are not treated as packages.

use crate::error::{PublisherError, Result};
use crate::manifest::{MANIFEST_FILE_NAME, Manifest};
use crate::package::{PackageName, PackageSet};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::str::FromStr;

/// What to do when a directory below the root cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalPolicy {
    /// Log the failure and carry on with the remaining directories.
    #[default]
    Skip,
    /// Abort discovery with a filesystem error.
    Fail,
}

impl FromStr for TraversalPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown traversal policy {other:?}; expected skip or fail")),
        }
    }
}

/// Discover every sub-package below `root`.
///
/// `root` itself is a container and is never recorded as a package. Entries
/// are visited in file-name order. Symlinks and regular files are ignored.
///
/// # Errors
///
/// - [`PublisherError::Filesystem`] if `root` cannot be read, or if a
///   subdirectory cannot be read under [`TraversalPolicy::Fail`].
/// - [`PublisherError::ManifestParse`] if a manifest is malformed or lacks a
///   usable `name`.
/// - [`PublisherError::DuplicatePackage`] if two manifests declare the same
///   name.
pub fn discover_packages(root: &Utf8Path, policy: TraversalPolicy) -> Result<PackageSet> {
    let mut packages = PackageSet::new();
    let children = child_directories(root)?;
    for child in children {
        visit(&child, policy, &mut packages)?;
    }
    debug!("discovered {} package(s) under {root}", packages.len());
    Ok(packages)
}

fn visit(dir: &Utf8Path, policy: TraversalPolicy, packages: &mut PackageSet) -> Result<()> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    if manifest_path.is_file() {
        let name = read_package_name(&manifest_path)?;
        debug!("found package {name} at {dir}");
        return packages.insert(name, dir.to_owned());
    }

    let children = match child_directories(dir) {
        Ok(children) => children,
        Err(err) => match policy {
            TraversalPolicy::Skip => {
                warn!("skipping unreadable directory: {err}");
                return Ok(());
            }
            TraversalPolicy::Fail => return Err(err),
        },
    };

    for child in children {
        visit(&child, policy, packages)?;
    }
    Ok(())
}

/// List the real (non-symlink) subdirectories of `dir`, sorted by name.
fn child_directories(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|e| PublisherError::filesystem(dir, e))?;
    let mut children = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| PublisherError::filesystem(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| PublisherError::filesystem(dir, e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        match Utf8PathBuf::try_from(entry.path()) {
            Ok(path) => children.push(path),
            Err(err) => warn!("ignoring non UTF-8 path {}", err.as_path().display()),
        }
    }
    children.sort();
    Ok(children)
}

fn read_package_name(manifest_path: &Utf8Path) -> Result<PackageName> {
    let manifest = Manifest::load(manifest_path)?;
    let name = manifest.name().ok_or_else(|| PublisherError::ManifestParse {
        path: manifest_path.to_owned(),
        reason: "missing string `name` field".to_owned(),
    })?;
    validate_name(&name, manifest_path)?;
    Ok(name)
}

/// Package names become archive file names and URL segments.
fn validate_name(name: &PackageName, manifest_path: &Utf8Path) -> Result<()> {
    let raw = name.as_str();
    let unusable = raw.is_empty()
        || raw.starts_with('/')
        || raw.contains('\\')
        || raw.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if unusable {
        return Err(PublisherError::ManifestParse {
            path: manifest_path.to_owned(),
            reason: format!("package name {raw:?} cannot be used as an archive name"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
