//! Progress reporting for the counting, parsing and upload phases.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::{IsTerminal, Write};

use crate::upload::UploadCounts;

/// Parse counters at one point in time. A plain value copy: later parsing
/// never changes a snapshot that was already reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseProgress {
    /// Data rows seen (valid or skipped).
    pub rows_processed: u64,
    pub records: u64,
    pub skipped: u64,
    pub bytes_read: u64,
    pub companies: usize,
    pub form_types: usize,
    pub extensions: usize,
    /// Pass 1 total, when known.
    pub total_rows: Option<u64>,
}

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Pass 1: data rows counted so far.
    Counting { rows: u64, bytes_read: u64 },
    /// Pass 2 snapshot.
    Parsing(ParseProgress),
    /// After each acknowledged chunk.
    Uploading {
        chunk: usize,
        total_chunks: usize,
        counts: UploadCounts,
    },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly progress on stderr: "parse  120,000 / 1,034,211 rows".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let line = match event {
            ProgressEvent::Counting { rows, bytes_read } => format!(
                "count  {} rows  ({} bytes)\n",
                format_number(*rows),
                format_number(*bytes_read)
            ),
            ProgressEvent::Parsing(p) => match p.total_rows {
                Some(total) => format!(
                    "parse  {} / {} rows  {} companies  {} skipped\n",
                    format_number(p.rows_processed),
                    format_number(total),
                    format_number(p.companies as u64),
                    format_number(p.skipped)
                ),
                None => format!(
                    "parse  {} rows  {} companies  {} skipped\n",
                    format_number(p.rows_processed),
                    format_number(p.companies as u64),
                    format_number(p.skipped)
                ),
            },
            ProgressEvent::Uploading {
                chunk,
                total_chunks,
                counts,
            } => format!(
                "upload  chunk {} / {}  companies {}  filings {}\n",
                chunk,
                total_chunks,
                format_number(counts.companies),
                format_number(counts.filings)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        let obj = match event {
            ProgressEvent::Counting { rows, bytes_read } => serde_json::json!({
                "event": "progress",
                "phase": "counting",
                "rows": rows,
                "bytes_read": bytes_read,
            }),
            ProgressEvent::Parsing(p) => serde_json::json!({
                "event": "progress",
                "phase": "parsing",
                "rows": p.rows_processed,
                "total": p.total_rows,
                "records": p.records,
                "skipped": p.skipped,
                "bytes_read": p.bytes_read,
                "companies": p.companies,
                "form_types": p.form_types,
                "extensions": p.extensions,
            }),
            ProgressEvent::Uploading {
                chunk,
                total_chunks,
                counts,
            } => serde_json::json!({
                "event": "progress",
                "phase": "uploading",
                "chunk": chunk,
                "total": total_chunks,
                "form_types": counts.form_types,
                "extensions": counts.extensions,
                "companies": counts.companies,
                "filings": counts.filings,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// `1234567` -> `1,234,567` for the row counters on stderr.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// How `ingest` reports counting, parsing and upload progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Without `--progress`: human lines on an interactive stderr, silent in pipelines.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
