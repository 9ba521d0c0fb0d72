//! Run timestamp token.
//!
//! A single [`RunTimestamp`] is computed when a run starts and used both in
//! rewritten dependency URLs and in published artifact paths, so it must be
//! usable verbatim as one URL path segment.

use crate::error::{PublisherError, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fmt;

/// Rendering applied to the wall clock before normalisation.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// The unique token identifying one pipeline execution.
///
/// # Examples
///
/// ```
/// use nightly_publisher::timestamp::RunTimestamp;
///
/// let ts = RunTimestamp::parse("2026-10-14-03-00-00")?;
/// assert_eq!(ts.as_str(), "2026-10-14-03-00-00");
/// assert!(RunTimestamp::parse("2026/10/14").is_err());
/// # Ok::<(), nightly_publisher::error::PublisherError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    /// Capture the current local time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Render a specific instant as a run token.
    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(normalise(&instant.format(TIMESTAMP_FORMAT).to_string()))
    }

    /// Accept an explicit token, such as one supplied on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::InvalidTimestamp`] if the token is empty,
    /// contains `..`, or uses a character outside `[A-Za-z0-9._-]`. The
    /// token is embedded verbatim in URLs and repository paths.
    pub fn parse(value: &str) -> Result<Self> {
        let reason = if value.is_empty() {
            Some("token is empty")
        } else if value.contains("..") {
            Some("token contains `..`")
        } else if !value.chars().all(is_token_char) {
            Some("token may only contain ASCII letters, digits, `.`, `_` and `-`")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PublisherError::InvalidTimestamp {
                value: value.to_owned(),
                reason,
            }),
            None => Ok(Self(value.to_owned())),
        }
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Replace every character that is unsafe in a path segment with `-`.
fn normalise(raw: &str) -> String {
    raw.chars()
        .map(|c| if is_token_char(c) { c } else { '-' })
        .collect()
}
