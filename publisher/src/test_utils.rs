//! Shared test utilities for the publisher crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour tests under `tests/`.

use crate::builder::{CommandExecutor, CommandSpec};
use crate::context::RepoRef;
use crate::error::{PublisherError, Result};
use crate::publish::{ArtifactStore, CreateFileRequest};
use crate::source::SnapshotFetcher;
use camino::Utf8PathBuf;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "yarn").
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The expected working directory.
    pub cwd: Utf8PathBuf,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Describe an expected invocation and its canned result.
    #[must_use]
    pub fn new(program: &'static str, args: &[&str], cwd: &str, result: Result<Output>) -> Self {
        Self {
            program,
            args: args.iter().map(|&a| a.to_owned()).collect(),
            cwd: Utf8PathBuf::from(cwd),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(PublisherError::StubMismatch {
                message: format!("unexpected command invocation: {spec}"),
            });
        };

        if call.program != spec.program || call.args != spec.args || call.cwd != spec.cwd {
            return Err(PublisherError::StubMismatch {
                message: format!(
                    "expected `{} {}` in {}, got `{spec}` in {}",
                    call.program,
                    call.args.join(" "),
                    call.cwd,
                    spec.cwd
                ),
            });
        }
        call.result
    }
}

/// A snapshot fetcher serving fixed bytes.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    bytes: Vec<u8>,
    requests: RefCell<Vec<RepoRef>>,
}

impl StaticFetcher {
    /// Serve `bytes` for every request.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Sources requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RepoRef> {
        self.requests.borrow().clone()
    }
}

impl SnapshotFetcher for StaticFetcher {
    fn fetch(&self, source: &RepoRef) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(source.clone());
        Ok(self.bytes.clone())
    }
}

/// An artifact store that records requests and can fail on one of them.
#[derive(Debug, Default)]
pub struct RecordingStore {
    requests: RefCell<Vec<CreateFileRequest>>,
    fail_at: Cell<Option<usize>>,
}

impl RecordingStore {
    /// A store accepting every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the request with zero-based position `index`.
    pub fn fail_at(&self, index: usize) {
        self.fail_at.set(Some(index));
    }

    /// Requests received so far, including a rejected one.
    #[must_use]
    pub fn requests(&self) -> Vec<CreateFileRequest> {
        self.requests.borrow().clone()
    }

    /// Paths of the requests received so far.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.path.to_string())
            .collect()
    }
}

impl ArtifactStore for RecordingStore {
    fn create_file(&self, request: &CreateFileRequest) -> Result<()> {
        let mut requests = self.requests.borrow_mut();
        let position = requests.len();
        requests.push(request.clone());
        if self.fail_at.get() == Some(position) {
            return Err(PublisherError::Publish {
                path: request.path.to_string(),
                reason: "rejected by test store".to_owned(),
            });
        }
        Ok(())
    }
}

/// Build an in-memory zip archive.
///
/// Entries whose content is `None` are written as directories.
///
/// # Errors
///
/// Returns any error raised while writing the archive.
pub fn zip_archive(entries: &[(&str, Option<&str>)]) -> zip::result::ZipResult<Vec<u8>> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        match content {
            None => writer.add_directory(*name, SimpleFileOptions::default())?,
            Some(body) => {
                writer.start_file(*name, SimpleFileOptions::default())?;
                writer.write_all(body.as_bytes())?;
            }
        }
    }
    Ok(writer.finish()?.into_inner())
}
