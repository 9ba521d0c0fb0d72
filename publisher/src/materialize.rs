//! Snapshot extraction into the working directory.
//!
//! The working directory is destroyed and recreated before extraction. The
//! snapshot's single top-level directory (named after the repository and
//! commit, so unpredictable) is resolved from the first archive entry.

use crate::error::{PublisherError, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

/// Clear `dir` and recreate it empty.
///
/// # Errors
///
/// Returns [`PublisherError::Filesystem`] if the directory cannot be removed
/// or created.
pub fn reset_directory(dir: &Utf8Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(PublisherError::filesystem(dir, e)),
    }
    fs::create_dir_all(dir).map_err(|e| PublisherError::filesystem(dir, e))
}

/// Resolve `path` against the current directory.
///
/// External tools run with their own working directory, so every path
/// handed to them must be absolute.
///
/// # Errors
///
/// Returns [`PublisherError::Filesystem`] if the current directory cannot
/// be read or is not UTF-8.
pub fn absolute_path(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let absolute = std::path::absolute(path).map_err(|e| PublisherError::filesystem(path, e))?;
    Utf8PathBuf::try_from(absolute).map_err(|e| PublisherError::filesystem(path, e.into_io_error()))
}

/// Extract snapshot `bytes` into a freshly cleared `working_root`.
///
/// Returns the path of the snapshot's top-level directory.
///
/// # Errors
///
/// Returns [`PublisherError::Extraction`] if the bytes are not a readable
/// zip archive, if the archive is empty, or if an entry would escape
/// `working_root`. Returns [`PublisherError::Filesystem`] if the directory
/// cannot be cleared or written.
pub fn materialize(bytes: &[u8], working_root: &Utf8Path) -> Result<Utf8PathBuf> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(extraction_error)?;
    let top = top_level_directory(&mut archive)?;

    reset_directory(working_root)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(extraction_error)?;
        let relative = entry.enclosed_name().ok_or_else(|| PublisherError::Extraction {
            reason: format!("entry {} escapes the working directory", entry.name()),
        })?;
        let dest = working_root.as_std_path().join(&relative);

        if entry.is_dir() {
            create_dir(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            create_dir(parent)?;
        }
        let mut file = fs::File::create(&dest).map_err(|e| fs_error(&dest, e))?;
        io::copy(&mut entry, &mut file).map_err(|e| PublisherError::Extraction {
            reason: format!("failed to extract {}: {e}", entry.name()),
        })?;
        restore_mode(&dest, entry.unix_mode())?;
    }

    let root = working_root.join(&top);
    debug!("extracted {} entries to {root}", archive.len());
    Ok(root)
}

/// The first path component of the first archive entry.
fn top_level_directory<R: io::Read + io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String> {
    if archive.is_empty() {
        return Err(PublisherError::Extraction {
            reason: "snapshot archive is empty".to_owned(),
        });
    }
    let first = archive.by_index(0).map_err(extraction_error)?;
    let name = first.name().trim_end_matches('/');
    match Utf8Path::new(name).components().next() {
        Some(Utf8Component::Normal(top)) => Ok(top.to_owned()),
        _ => Err(PublisherError::Extraction {
            reason: format!("first entry {:?} is not a top-level directory", first.name()),
        }),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| fs_error(path, e))
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| fs_error(path, e)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

fn fs_error(path: &Path, source: io::Error) -> PublisherError {
    PublisherError::Filesystem {
        path: Utf8PathBuf::from(path.to_string_lossy().into_owned()),
        source,
    }
}

fn extraction_error(err: zip::result::ZipError) -> PublisherError {
    PublisherError::Extraction {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn snapshot(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            match content {
                None => writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .expect("add directory"),
                Some(body) => {
                    writer
                        .start_file(*name, SimpleFileOptions::default())
                        .expect("start file");
                    writer.write_all(body.as_bytes()).expect("write file");
                }
            }
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    #[test]
    fn extracts_and_resolves_top_directory() {
        let (_temp, base) = temp_root();
        let working_root = base.join("temp");
        let bytes = snapshot(&[
            ("resolve-dev/", None),
            ("resolve-dev/package.json", Some(r#"{"private": true}"#)),
            ("resolve-dev/packages/core/package.json", Some(r#"{"name": "core"}"#)),
        ]);

        let root = materialize(&bytes, &working_root).expect("materialize");
        assert_eq!(root, working_root.join("resolve-dev"));
        assert!(root.join("packages/core/package.json").is_file());
    }

    #[test]
    fn top_directory_comes_from_first_file_entry_without_directory_records() {
        let (_temp, base) = temp_root();
        let bytes = snapshot(&[("resolve-4f2a9c1/README.md", Some("hello"))]);

        let root = materialize(&bytes, &base.join("temp")).expect("materialize");
        assert!(root.ends_with("resolve-4f2a9c1"));
        assert!(root.join("README.md").is_file());
    }

    #[test]
    fn previous_contents_are_removed() {
        let (_temp, base) = temp_root();
        let working_root = base.join("temp");
        fs::create_dir_all(working_root.join("stale")).expect("create stale dir");
        fs::write(working_root.join("stale/file.txt"), "old").expect("write stale file");

        let bytes = snapshot(&[("repo-main/", None), ("repo-main/new.txt", Some("new"))]);
        materialize(&bytes, &working_root).expect("materialize");

        assert!(!working_root.join("stale").exists());
        assert!(working_root.join("repo-main/new.txt").is_file());
    }

    #[test]
    fn corrupt_bytes_are_an_extraction_error() {
        let (_temp, base) = temp_root();
        let result = materialize(b"definitely not a zip", &base.join("temp"));
        assert!(matches!(result, Err(PublisherError::Extraction { .. })));
    }

    #[test]
    fn empty_archive_is_an_extraction_error() {
        let (_temp, base) = temp_root();
        let bytes = snapshot(&[]);
        let result = materialize(&bytes, &base.join("temp"));
        assert!(matches!(result, Err(PublisherError::Extraction { .. })));
    }

    #[test]
    fn corrupt_bytes_leave_existing_tree_untouched() {
        let (_temp, base) = temp_root();
        let working_root = base.join("temp");
        fs::create_dir_all(&working_root).expect("create working root");
        fs::write(working_root.join("keep.txt"), "keep").expect("write file");

        let _ = materialize(b"garbage", &working_root);
        assert!(working_root.join("keep.txt").is_file());
    }

    #[test]
    fn reset_directory_creates_missing_directory() {
        let (_temp, base) = temp_root();
        let dir = base.join("nested/output");
        reset_directory(&dir).expect("reset");
        assert!(dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bits_are_restored() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, base) = temp_root();
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "repo-main/bin/run.sh",
                SimpleFileOptions::default().unix_permissions(0o755),
            )
            .expect("start file");
        writer.write_all(b"#!/bin/sh\n").expect("write");
        let bytes = writer.finish().expect("finish").into_inner();

        let root = materialize(&bytes, &base.join("temp")).expect("materialize");
        let mode = fs::metadata(root.join("bin/run.sh"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
