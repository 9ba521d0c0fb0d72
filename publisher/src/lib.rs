//! Nightly snapshot publisher library.
//!
//! This crate turns the current state of a monorepo branch into a set of
//! timestamped, cross-referencing package archives and uploads them to an
//! artifact repository. It is used by the `nightly-publisher` binary and can
//! be driven programmatically with substitute collaborators for testing.
//!
//! # Modules
//!
//! - [`builder`] - External command execution and the install step
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Settings resolution from the CLI, a TOML file and defaults
//! - [`context`] - Per-run context, repository references and credentials
//! - [`discovery`] - Sub-package discovery below the packages directory
//! - [`error`] - Semantic error types
//! - [`manifest`] - Order-preserving `package.json` access
//! - [`materialize`] - Snapshot extraction into the working directory
//! - [`output`] - Progress and summary text
//! - [`package`] - Package names and the discovered package set
//! - [`packager`] - Packing sub-packages into archives
//! - [`pipeline`] - End-to-end run orchestration
//! - [`publish`] - Uploading archives to the artifact repository
//! - [`rewrite`] - Rewriting internal dependencies to artifact URLs
//! - [`source`] - Snapshot retrieval from the source host
//! - [`timestamp`] - The run timestamp token

pub mod builder;
pub mod cli;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod materialize;
pub mod output;
pub mod package;
pub mod packager;
pub mod pipeline;
pub mod publish;
pub mod rewrite;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod timestamp;
