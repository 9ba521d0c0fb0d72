//! Checks the log records a publishing run emits.
//!
//! `logtest` installs a process-wide logger, so this binary holds a single
//! test.

use camino::Utf8PathBuf;
use logtest::Logger;
use nightly_publisher::context::{Credentials, RunContext};
use nightly_publisher::packager::TarballPacker;
use nightly_publisher::pipeline::{Collaborators, run_pipeline};
use nightly_publisher::test_utils::{
    ExpectedCall, RecordingStore, StaticFetcher, StubExecutor, success_output, zip_archive,
};
use nightly_publisher::timestamp::RunTimestamp;
use tempfile::TempDir;

#[test]
fn run_logs_fetch_and_each_upload() {
    let mut logger = Logger::start();
    let temp_dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 temp dir");
    let context = RunContext::new(
        RunTimestamp::parse("2026-10-14-03-00-00").expect("valid timestamp"),
        Credentials {
            username: "nightly-bot".to_owned(),
            password: "token".to_owned(),
        },
        root.join("temp"),
        root.join("tarballs"),
    );

    let snapshot = zip_archive(&[
        ("resolve-dev/package.json", Some(r#"{"private":true}"#)),
        (
            "resolve-dev/packages/core/package.json",
            Some(r#"{"name":"core","version":"1.0.0"}"#),
        ),
    ])
    .expect("build snapshot zip");
    let fetcher = StaticFetcher::new(snapshot);
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "yarn",
        &[],
        root.join("temp/resolve-dev").as_str(),
        Ok(success_output()),
    )]);
    let store = RecordingStore::new();
    let collaborators = Collaborators {
        fetcher: &fetcher,
        executor: &executor,
        packer: &TarballPacker,
        store: &store,
    };

    let mut stderr = Vec::new();
    run_pipeline(&context, &collaborators, &mut stderr).expect("run succeeds");
    executor.assert_finished();

    let mut messages = Vec::new();
    while let Some(record) = logger.pop() {
        messages.push(record.args().to_string());
    }

    assert!(
        messages.iter().any(|m| m.starts_with("fetched ")),
        "expected a fetch record, got {messages:?}"
    );
    assert!(
        messages
            .iter()
            .any(|m| m == "published packages/2026-10-14-03-00-00/core.tgz"),
        "expected an upload record, got {messages:?}"
    );
}
