//! `package.json` manifests.
//!
//! A [`Manifest`] keeps the whole JSON document in an order-preserving map so
//! that rewriting a handful of dependency specifiers leaves every other key
//! and value exactly as it was.

use crate::error::{PublisherError, Result};
use crate::package::PackageName;
use camino::Utf8Path;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;

/// File name identifying a sub-package directory.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// The dependency sections that may reference other packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencySection {
    /// Runtime dependencies.
    Dependencies,
    /// Development-only dependencies.
    DevDependencies,
    /// Peer dependencies.
    PeerDependencies,
}

impl DependencySection {
    /// Every recognised section, in rewrite order.
    pub const ALL: [Self; 3] = [
        Self::Dependencies,
        Self::DevDependencies,
        Self::PeerDependencies,
    ];

    /// The JSON key of this section.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::PeerDependencies => "peerDependencies",
        }
    }
}

impl fmt::Display for DependencySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed `package.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    document: Map<String, Value>,
}

impl Manifest {
    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::ManifestParse`] if the text is not a JSON
    /// object.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use nightly_publisher::manifest::Manifest;
    ///
    /// let manifest = Manifest::parse(r#"{"name": "resolve-core"}"#, Utf8Path::new("package.json"))?;
    /// assert_eq!(manifest.name().map(|n| n.to_string()), Some("resolve-core".to_owned()));
    /// # Ok::<(), nightly_publisher::error::PublisherError>(())
    /// ```
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| parse_error(path, e))?;
        match value {
            Value::Object(document) => Ok(Self { document }),
            _ => Err(parse_error(path, "top-level value is not an object")),
        }
    }

    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Filesystem`] if the file cannot be read and
    /// [`PublisherError::ManifestParse`] if it is not a JSON object.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PublisherError::filesystem(path, e))?;
        Self::parse(&text, path)
    }

    /// Write the manifest back as two-space indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Filesystem`] if the file cannot be written.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        fs::write(path, self.to_pretty_json()).map_err(|e| PublisherError::filesystem(path, e))
    }

    /// Render the manifest as two-space indented JSON.
    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        // Serialising a map of JSON values cannot fail.
        serde_json::to_string_pretty(&self.document).unwrap_or_default()
    }

    /// The declared package name, if present and a string.
    #[must_use]
    pub fn name(&self) -> Option<PackageName> {
        self.document
            .get("name")
            .and_then(Value::as_str)
            .map(PackageName::from)
    }

    /// Mutable access to a dependency section.
    ///
    /// Returns `Ok(None)` when the section is absent.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::ManifestParse`] if the section is present but
    /// is not a JSON object.
    pub fn section_mut(
        &mut self,
        section: DependencySection,
        path: &Utf8Path,
    ) -> Result<Option<&mut Map<String, Value>>> {
        match self.document.get_mut(section.key()) {
            None => Ok(None),
            Some(Value::Object(entries)) => Ok(Some(entries)),
            Some(_) => Err(parse_error(
                path,
                format!("`{}` is not an object", section.key()),
            )),
        }
    }

    /// Read-only access to a dependency section, if present as an object.
    #[must_use]
    pub fn section(&self, section: DependencySection) -> Option<&Map<String, Value>> {
        self.document.get(section.key()).and_then(Value::as_object)
    }

    /// The specifier recorded for `dependency` in `section`, if it is a string.
    #[must_use]
    pub fn specifier(&self, section: DependencySection, dependency: &str) -> Option<&str> {
        self.section(section)
            .and_then(|entries| entries.get(dependency))
            .and_then(Value::as_str)
    }
}

fn parse_error(path: &Utf8Path, reason: impl fmt::Display) -> PublisherError {
    PublisherError::ManifestParse {
        path: path.to_owned(),
        reason: reason.to_string(),
    }
}
