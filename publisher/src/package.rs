//! Discovered sub-packages.
//!
//! This module provides the [`PackageName`] newtype and the ordered
//! [`PackageSet`] produced by discovery and consumed by the rewrite, pack,
//! and publish stages.

use crate::error::{PublisherError, Result};
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::fmt;

/// A package name as declared by the `name` field of its manifest.
///
/// Scoped names such as `@resolve-js/core` are represented verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the package name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the archive packed for this package.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::package::PackageName;
    ///
    /// assert_eq!(PackageName::from("resolve-core").archive_file_name(), "resolve-core.tgz");
    /// ```
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}.tgz", self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One discovered sub-package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Name from the package's manifest.
    pub name: PackageName,
    /// Directory holding the package's `package.json`.
    pub directory: Utf8PathBuf,
}

impl PackageEntry {
    /// Path of the package's manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.directory.join(crate::manifest::MANIFEST_FILE_NAME)
    }
}

/// Discovered packages in discovery order, unique by name.
#[derive(Debug, Clone, Default)]
pub struct PackageSet {
    entries: Vec<PackageEntry>,
    index: HashMap<PackageName, usize>,
}

impl PackageSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, rejecting a name that is already present.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::DuplicatePackage`] when another package with
    /// the same name has already been inserted.
    pub fn insert(&mut self, name: PackageName, directory: Utf8PathBuf) -> Result<()> {
        if let Some(existing) = self.get(&name) {
            return Err(PublisherError::DuplicatePackage {
                name: name.0,
                first: existing.directory.clone(),
                second: directory,
            });
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(PackageEntry { name, directory });
        Ok(())
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<&PackageEntry> {
        self.index.get(name).and_then(|&i| self.entries.get(i))
    }

    /// Whether a dependency key names a discovered package.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&PackageName::from(name))
    }

    /// Iterate packages in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, PackageEntry> {
        self.entries.iter()
    }

    /// Number of packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no packages were discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PackageSet {
    type Item = &'a PackageEntry;
    type IntoIter = std::slice::Iter<'a, PackageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_discovery_order() {
        let mut set = PackageSet::new();
        set.insert("zeta".into(), "packages/zeta".into())
            .expect("insert zeta");
        set.insert("alpha".into(), "packages/alpha".into())
            .expect("insert alpha");

        let names: Vec<&str> = set.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn insert_rejects_duplicate_names() {
        let mut set = PackageSet::new();
        set.insert("core".into(), "packages/core".into())
            .expect("first insert");
        let err = set
            .insert("core".into(), "packages/legacy/core".into())
            .expect_err("duplicate should fail");

        match err {
            PublisherError::DuplicatePackage {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "core");
                assert_eq!(first, Utf8PathBuf::from("packages/core"));
                assert_eq!(second, Utf8PathBuf::from("packages/legacy/core"));
            }
            other => panic!("expected DuplicatePackage, got {other:?}"),
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn contains_matches_exact_names_only() {
        let mut set = PackageSet::new();
        set.insert("@scope/core".into(), "packages/core".into())
            .expect("insert");
        assert!(set.contains("@scope/core"));
        assert!(!set.contains("core"));
        assert!(!set.contains("@scope/Core"));
    }

    #[test]
    fn scoped_archive_name_keeps_scope() {
        let name = PackageName::from("@scope/core");
        assert_eq!(name.archive_file_name(), "@scope/core.tgz");
    }
}
