use crate::{Account, ReviewRecord};
use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use std::io::BufRead;
use thiserror::Error;
use tracing::warn;

/// Automatic comment Gerrit posts when it carries votes across a rebase.
const TRIVIAL_REBASE_MARKER: &str = "Gerrit trivial rebase";

/// Errors that can occur while decoding a query response line.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("invalid change number: {0}")]
    InvalidNumber(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A change as returned by `gerrit query --comments --format=JSON`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeRecord {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub branch: String,
    /// The Change-Id.
    pub id: String,
    #[serde(deserialize_with = "change_number")]
    pub number: u64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub owner: Account,
    pub url: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A comment on a change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Comment {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub reviewer: Account,
    pub message: String,
}

/// Trailing statistics line of a query response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub more_changes: bool,
}

/// One decoded line of a query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryLine {
    Change(Box<ChangeRecord>),
    Stats(QueryStats),
}

/// Older Gerrit releases report change numbers as strings.
fn change_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(ParseError::InvalidNumber(s))),
    }
}

/// Decode a single non-blank response line.
pub fn parse_line(line: &str) -> Result<QueryLine> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    let Some(object) = value.as_object() else {
        return Err(ParseError::NotAnObject);
    };

    if object.get("type").and_then(|t| t.as_str()) == Some("stats") {
        return Ok(QueryLine::Stats(serde_json::from_value(value)?));
    }

    Ok(QueryLine::Change(Box::new(serde_json::from_value(value)?)))
}

/// Extract the comments `reviewer` left on a change.
///
/// Changes owned by the reviewer yield nothing, and automatic trivial-rebase
/// notices are dropped, as are comments whose timestamp cannot be
/// represented. Comments keep the server's order.
pub fn extract_comments(change: &ChangeRecord, reviewer: &str) -> Vec<ReviewRecord> {
    if change.owner.matches(reviewer) {
        return Vec::new();
    }

    change
        .comments
        .iter()
        .filter(|c| c.reviewer.matches(reviewer))
        .filter(|c| !c.message.contains(TRIVIAL_REBASE_MARKER))
        .filter_map(|c| {
            let Some(timestamp) = DateTime::from_timestamp(c.timestamp, 0) else {
                warn!(
                    change = change.number,
                    timestamp = c.timestamp,
                    "skipping comment with out-of-range timestamp"
                );
                return None;
            };
            Some(ReviewRecord {
                change_id: change.id.clone(),
                url: change.url.clone(),
                timestamp,
                message: c.message.clone(),
                reviewer: c.reviewer.clone(),
            })
        })
        .collect()
}

/// Lazy stream of changes over a line-oriented query response.
///
/// Malformed lines are skipped with a warning and counted; the stats line is
/// recorded rather than yielded. Read errors end the stream.
pub struct ChangeStream<R> {
    reader: R,
    line_number: usize,
    skipped: usize,
    stats: Option<QueryStats>,
    done: bool,
}

impl<R: BufRead> ChangeStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            skipped: 0,
            stats: None,
            done: false,
        }
    }

    /// Number of lines that could not be decoded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Statistics line, once it has been read.
    pub fn stats(&self) -> Option<QueryStats> {
        self.stats
    }

    fn skip(&mut self, error: &dyn std::fmt::Display) {
        self.skipped += 1;
        warn!(line = self.line_number, %error, "skipping malformed record");
    }
}

impl<R: BufRead> Iterator for ChangeStream<R> {
    type Item = std::io::Result<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        while !self.done {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line.trim(),
                        Err(err) => {
                            self.skip(&err);
                            continue;
                        }
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Ok(QueryLine::Change(change)) => return Some(Ok(*change)),
                        Ok(QueryLine::Stats(stats)) => self.stats = Some(stats),
                        Err(err) => self.skip(&err),
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
