//! Unit tests for sub-package discovery.

use super::*;
use rstest::rstest;
use tempfile::TempDir;

fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    (temp, path)
}

fn write_manifest(dir: &Utf8Path, body: &str) {
    fs::create_dir_all(dir).expect("create package dir");
    fs::write(dir.join(MANIFEST_FILE_NAME), body).expect("write manifest");
}

fn named(name: &str) -> String {
    format!(r#"{{"name": "{name}", "version": "1.0.0"}}"#)
}

fn names(set: &PackageSet) -> Vec<String> {
    set.iter().map(|e| e.name.to_string()).collect()
}

#[test]
fn empty_root_yields_no_packages() {
    let (_temp, root) = temp_root();
    fs::create_dir_all(root.join("docs/images")).expect("create dirs");

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    assert!(packages.is_empty());
}

#[test]
fn packages_are_keyed_by_manifest_name() {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("core"), &named("resolve-core"));

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    let entry = packages
        .get(&PackageName::from("resolve-core"))
        .expect("package discovered");
    assert_eq!(entry.directory, root.join("core"));
}

#[test]
fn non_package_directories_are_recursed() {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("modules/module-admin"), &named("module-admin"));
    write_manifest(&root.join("adapters/storage/sqlite"), &named("storage-sqlite"));

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    assert_eq!(names(&packages), vec!["storage-sqlite", "module-admin"]);
}

#[test]
fn package_directories_are_leaves() {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("core"), &named("core"));
    write_manifest(&root.join("core/test/fixture"), &named("fixture"));
    write_manifest(&root.join("core/node_modules/left-pad"), &named("left-pad"));

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    assert_eq!(names(&packages), vec!["core"]);
}

#[test]
fn root_manifest_is_not_a_package() {
    let (_temp, root) = temp_root();
    write_manifest(&root, &named("monorepo-root"));
    write_manifest(&root.join("core"), &named("core"));

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    assert_eq!(names(&packages), vec!["core"]);
}

#[test]
fn regular_files_are_ignored() {
    let (_temp, root) = temp_root();
    fs::write(root.join("README.md"), "docs").expect("write file");
    write_manifest(&root.join("core"), &named("core"));

    let packages = discover_packages(&root, TraversalPolicy::Fail).expect("discover");
    assert_eq!(packages.len(), 1);
}

#[test]
fn duplicate_names_are_fatal() {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("a"), &named("shared"));
    write_manifest(&root.join("b"), &named("shared"));

    let result = discover_packages(&root, TraversalPolicy::Skip);
    assert!(
        matches!(result, Err(PublisherError::DuplicatePackage { ref name, .. }) if name == "shared"),
        "expected DuplicatePackage, got {result:?}"
    );
}

#[rstest]
#[case::invalid_json("{ nope")]
#[case::missing_name(r#"{"version": "1.0.0"}"#)]
#[case::traversal_name(r#"{"name": "../escape"}"#)]
#[case::empty_scope(r#"{"name": "@scope/"}"#)]
fn unusable_manifests_are_parse_errors(#[case] body: &str) {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("broken"), body);

    let result = discover_packages(&root, TraversalPolicy::Skip);
    assert!(
        matches!(result, Err(PublisherError::ManifestParse { .. })),
        "expected ManifestParse, got {result:?}"
    );
}

#[test]
fn scoped_names_are_accepted() {
    let (_temp, root) = temp_root();
    write_manifest(&root.join("core"), &named("@resolve-js/core"));

    let packages = discover_packages(&root, TraversalPolicy::Skip).expect("discover");
    assert!(packages.contains("@resolve-js/core"));
}

#[test]
fn missing_root_is_a_filesystem_error() {
    let (_temp, root) = temp_root();
    let result = discover_packages(&root.join("absent"), TraversalPolicy::Skip);
    assert!(matches!(result, Err(PublisherError::Filesystem { .. })));
}

#[rstest]
#[case::skip(TraversalPolicy::Skip, "skip")]
#[case::fail(TraversalPolicy::Fail, "fail")]
fn traversal_policy_parses(#[case] expected: TraversalPolicy, #[case] raw: &str) {
    assert_eq!(raw.parse::<TraversalPolicy>(), Ok(expected));
}

#[test]
fn traversal_policy_rejects_unknown_values() {
    assert!("ignore".parse::<TraversalPolicy>().is_err());
}

#[cfg(unix)]
mod unreadable {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Builds a tree with one unreadable directory. Returns `None` when the
    /// current user can read it anyway (for example when running as root).
    fn tree_with_locked_dir() -> Option<(TempDir, Utf8PathBuf)> {
        let (temp, root) = temp_root();
        write_manifest(&root.join("core"), &named("core"));
        let locked = root.join("locked");
        write_manifest(&locked.join("hidden"), &named("hidden"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("lock dir");

        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock dir");
            return None;
        }
        Some((temp, root))
    }

    fn unlock(root: &Utf8Path) {
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755))
            .expect("unlock dir");
    }

    #[test]
    fn skip_policy_tolerates_unreadable_directories() {
        let Some((_temp, root)) = tree_with_locked_dir() else {
            return;
        };
        let result = discover_packages(&root, TraversalPolicy::Skip);
        unlock(&root);

        let packages = result.expect("discovery should tolerate unreadable dirs");
        assert_eq!(names(&packages), vec!["core"]);
    }

    #[test]
    fn fail_policy_reports_unreadable_directories() {
        let Some((_temp, root)) = tree_with_locked_dir() else {
            return;
        };
        let result = discover_packages(&root, TraversalPolicy::Fail);
        unlock(&root);

        assert!(
            matches!(result, Err(PublisherError::Filesystem { ref path, .. }) if path.ends_with("locked")),
            "expected Filesystem error for locked dir, got {result:?}"
        );
    }
}
