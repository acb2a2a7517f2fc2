use crate::cli::{ColorChoice, OutputFormat};
use crate::parser::{ChangeStream, extract_comments};
use crate::{QuerySummary, ReviewRecord};
use chrono::Local;
use crossterm::style::Stylize;
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How review records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub format: OutputFormat,
    pub color: bool,
}

impl Style {
    /// Resolve the color choice against stdout.
    pub fn new(format: OutputFormat, color: ColorChoice) -> Self {
        let color = match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        };
        Self { format, color }
    }
}

/// Render one record.
///
/// The line format always yields exactly one line; the full format keeps the
/// message verbatim under a header and ends with a blank line.
pub fn format_record(record: &ReviewRecord, style: Style) -> String {
    let timestamp = record
        .timestamp
        .with_timezone(&Local)
        .format(TIMESTAMP_FORMAT);
    let header = format!(
        "{} {} ({})",
        record.url,
        timestamp,
        record.reviewer.display_name()
    );
    let header = if style.color {
        header.as_str().cyan().to_string()
    } else {
        header
    };

    match style.format {
        OutputFormat::Line => format!("{} {}\n", header, collapse_whitespace(&record.message)),
        OutputFormat::Full => format!("{}\n{}\n\n", header, record.message),
    }
}

/// Collapse every run of whitespace, line breaks included, to one space.
fn collapse_whitespace(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Write every comment by `reviewer` found in `changes`, in the order received.
///
/// Output written before an error stays written.
pub fn write_all_comments<R, W>(
    changes: &mut ChangeStream<R>,
    reviewer: &str,
    out: &mut W,
    style: Style,
) -> io::Result<QuerySummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = QuerySummary::default();

    for change in changes.by_ref() {
        let change = change?;
        summary.changes += 1;
        for record in extract_comments(&change, reviewer) {
            debug!(change_id = %record.change_id, "writing comment");
            out.write_all(format_record(&record, style).as_bytes())?;
            summary.comments += 1;
        }
    }
    out.flush()?;

    summary.skipped_lines = changes.skipped();
    let stats = changes.stats().unwrap_or_default();
    summary.more_changes = stats.more_changes;
    debug!(
        rows = stats.row_count,
        changes = summary.changes,
        comments = summary.comments,
        skipped = summary.skipped_lines,
        "finished writing comments"
    );

    Ok(summary)
}
