//! Packing rewritten sub-packages into `.tgz` archives.
//!
//! The output directory is cleared before the first package is packed.
//! Archives are produced in discovery order; when one package fails, the
//! archives already written stay in place for inspection.

use crate::builder::{CommandExecutor, CommandSpec, failure_reason};
use crate::error::{PublisherError, Result};
use crate::materialize::{absolute_path, reset_directory};
use crate::package::{PackageEntry, PackageName, PackageSet};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::str::FromStr;

/// Directories never included in natively built tarballs.
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git"];

/// Prefix of every entry in an npm package tarball.
const TARBALL_ROOT: &str = "package";

/// One packaged archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Package the archive was built from.
    pub package_name: PackageName,
    /// Archive file name relative to the output directory.
    pub file_name: String,
    /// Full path of the archive.
    pub path: Utf8PathBuf,
    /// Lowercase hex SHA-256 digest of the archive.
    pub sha256: String,
}

/// Which packing implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackerKind {
    /// Run `yarn pack` in each package directory.
    #[default]
    Yarn,
    /// Build the tarball in-process.
    Native,
}

impl FromStr for PackerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "yarn" => Ok(Self::Yarn),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown packer {other:?}; expected yarn or native")),
        }
    }
}

/// Produces one archive for a package directory.
#[cfg_attr(test, mockall::automock)]
pub trait ArchivePacker {
    /// Write the archive for `entry` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Packaging`] if the archive cannot be produced.
    fn pack(&self, entry: &PackageEntry, dest: &Utf8Path) -> Result<()>;
}

/// Packs with an external tool (`yarn pack --filename=<dest>`).
pub struct ToolPacker<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
}

impl<'a> ToolPacker<'a> {
    /// Create a packer running `yarn pack`.
    #[must_use]
    pub fn yarn(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            program: "yarn".to_owned(),
        }
    }

    /// The command run for one package.
    #[must_use]
    pub fn command_for(&self, entry: &PackageEntry, dest: &Utf8Path) -> CommandSpec {
        CommandSpec::new(
            self.program.clone(),
            ["pack".to_owned(), format!("--filename={dest}")],
            entry.directory.clone(),
        )
    }
}

impl ArchivePacker for ToolPacker<'_> {
    fn pack(&self, entry: &PackageEntry, dest: &Utf8Path) -> Result<()> {
        let spec = self.command_for(entry, dest);
        let output = self
            .executor
            .run(&spec)
            .map_err(|e| packaging_error(&entry.name, e))?;
        if !output.status.success() {
            return Err(packaging_error(&entry.name, failure_reason(&output)));
        }
        Ok(())
    }
}

/// Builds npm-layout tarballs in-process.
///
/// Entries are written in sorted order with zeroed timestamps and fixed
/// modes, so packing an unchanged directory twice yields identical bytes.
/// `node_modules` and `.git` are skipped; `files` and `.npmignore` are not
/// interpreted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarballPacker;

impl ArchivePacker for TarballPacker {
    fn pack(&self, entry: &PackageEntry, dest: &Utf8Path) -> Result<()> {
        let mut files = Vec::new();
        collect_files(&entry.directory, Utf8Path::new(""), &mut files)?;
        files.sort();

        let output = fs::File::create(dest).map_err(|e| PublisherError::filesystem(dest, e))?;
        let encoder = GzEncoder::new(output, Compression::default());
        let mut archive = tar::Builder::new(encoder);

        for relative in &files {
            let source = entry.directory.join(relative);
            let mut file =
                fs::File::open(&source).map_err(|e| PublisherError::filesystem(&source, e))?;
            let metadata = file
                .metadata()
                .map_err(|e| PublisherError::filesystem(&source, e))?;

            let mut header = tar::Header::new_gnu();
            header.set_size(metadata.len());
            header.set_mode(normalised_mode(&metadata));
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            header.set_entry_type(tar::EntryType::Regular);
            archive
                .append_data(&mut header, format!("{TARBALL_ROOT}/{relative}"), &mut file)
                .map_err(|e| packaging_error(&entry.name, e))?;
        }

        let encoder = archive
            .into_inner()
            .map_err(|e| packaging_error(&entry.name, e))?;
        encoder
            .finish()
            .map_err(|e| packaging_error(&entry.name, e))?;
        Ok(())
    }
}

/// Recursively list regular files below `base/relative`, relative to `base`.
fn collect_files(base: &Utf8Path, relative: &Utf8Path, files: &mut Vec<Utf8PathBuf>) -> Result<()> {
    let dir = base.join(relative);
    let read_dir = fs::read_dir(&dir).map_err(|e| PublisherError::filesystem(&dir, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| PublisherError::filesystem(&dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| PublisherError::filesystem(&dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let child = relative.join(&name);
        if file_type.is_dir() {
            if !EXCLUDED_DIRS.contains(&name.as_str()) {
                collect_files(base, &child, files)?;
            }
        } else if file_type.is_file() {
            files.push(child);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn normalised_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 == 0 {
        0o644
    } else {
        0o755
    }
}

#[cfg(not(unix))]
fn normalised_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

fn packaging_error(package: &PackageName, reason: impl std::fmt::Display) -> PublisherError {
    PublisherError::Packaging {
        package: package.to_string(),
        reason: reason.to_string(),
    }
}

/// Compute the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns [`PublisherError::Filesystem`] if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| PublisherError::filesystem(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| PublisherError::filesystem(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Packs every discovered package into an output directory.
pub struct Packager<'a> {
    packer: &'a dyn ArchivePacker,
    output_dir: Utf8PathBuf,
}

impl<'a> Packager<'a> {
    /// Create a packager writing archives to `output_dir`.
    #[must_use]
    pub fn new(packer: &'a dyn ArchivePacker, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            packer,
            output_dir: output_dir.into(),
        }
    }

    /// Clear and recreate the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Filesystem`] if the directory cannot be reset.
    pub fn prepare(&self) -> Result<()> {
        reset_directory(&self.output_dir)
    }

    /// Pack one package.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Packaging`] if packing fails, or
    /// [`PublisherError::Filesystem`] if a scope directory cannot be created.
    pub fn pack(&self, entry: &PackageEntry) -> Result<Artifact> {
        let file_name = entry.name.archive_file_name();
        let path = absolute_path(&self.output_dir.join(&file_name))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PublisherError::filesystem(parent, e))?;
        }

        self.packer.pack(entry, &path)?;
        if !path.is_file() {
            return Err(packaging_error(
                &entry.name,
                format!("packer reported success but {path} was not written"),
            ));
        }
        let sha256 = compute_sha256(&path)?;
        debug!("packed {path} (sha256 {sha256})");

        Ok(Artifact {
            package_name: entry.name.clone(),
            file_name,
            path,
            sha256,
        })
    }

    /// Prepare the output directory and pack every package in order.
    ///
    /// # Errors
    ///
    /// Returns the first packing or filesystem error. Archives produced
    /// before the failure are left in the output directory.
    pub fn pack_all(&self, packages: &PackageSet) -> Result<Vec<Artifact>> {
        self.prepare()?;
        let artifacts = packages
            .iter()
            .map(|entry| self.pack(entry))
            .collect::<Result<Vec<_>>>()?;
        info!("packed {} archive(s) into {}", artifacts.len(), self.output_dir);
        Ok(artifacts)
    }
}

#[cfg(test)]
#[path = "packager_tests.rs"]
mod tests;
