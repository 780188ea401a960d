//! Access-log line matching
//!
//! Turns one line of Common Log Format text into a [`ParsedRequest`].
//! Only GET requests are recognised; everything structurally different is
//! rejected without an error.

use std::num::ParseIntError;
use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use thiserror::Error;

use crate::models::ParsedRequest;

/// Timestamp layout inside the brackets, e.g. `01/Jul/1995:00:00:01 -0400`.
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Asset extensions that never produce a record (compared case-insensitively).
pub const IGNORED_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "css", "js", "mpg", "xbm", "wav", "txt",
];

static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<client>\S+) - - \[(?P<timestamp>[^\]]+)\] "GET (?P<uri>[^\s?]+)(?:\?\S+)? (?P<protocol>\S+)" (?P<status>\d+) (?P<size>\d+)$"#,
    )
    .expect("access log pattern is a valid regex")
});

/// A line matched the grammar but one of its fields could not be converted.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid status code '{value}': {source}")]
    StatusCode {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid response size '{value}': {source}")]
    ResponseSize {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordMatcher;

impl RecordMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Match a single raw line.
    ///
    /// Returns `Ok(None)` for lines outside the grammar (non-GET methods,
    /// missing fields, `-` sizes) and for requests of ignored asset types.
    /// Returns `Err` only when the line has the right shape but a field
    /// fails to convert; callers drop such lines.
    pub fn match_line(&self, line: &str) -> Result<Option<ParsedRequest>, MatchError> {
        let Some(caps) = LOG_LINE.captures(line) else {
            return Ok(None);
        };

        let uri = &caps["uri"];
        if is_ignored_asset(uri) {
            return Ok(None);
        }

        let raw_timestamp = &caps["timestamp"];
        let timestamp = DateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT).map_err(
            |source| MatchError::Timestamp {
                value: raw_timestamp.to_string(),
                source,
            },
        )?;

        let status = &caps["status"];
        let status_code = status.parse::<u32>().map_err(|source| MatchError::StatusCode {
            value: status.to_string(),
            source,
        })?;

        let size = &caps["size"];
        let response_size = size.parse::<u64>().map_err(|source| MatchError::ResponseSize {
            value: size.to_string(),
            source,
        })?;

        Ok(Some(ParsedRequest {
            client: caps["client"].to_string(),
            timestamp,
            request_uri: uri.to_string(),
            protocol_version: caps["protocol"].to_string(),
            status_code,
            response_size,
        }))
    }
}

/// Extension of the last path segment, without the dot.
///
/// A dot in a directory name does not count: `/a.b/c` has no extension.
fn extension(uri: &str) -> Option<&str> {
    let segment = uri.rsplit('/').next().unwrap_or(uri);
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

pub fn is_ignored_asset(uri: &str) -> bool {
    extension(uri).is_some_and(|ext| {
        IGNORED_EXTENSIONS
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(ext))
    })
}
