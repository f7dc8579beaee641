use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::accession::Accession;
use crate::classify::{LineClassifier, LineKind};
use crate::codec::RawLine;
use crate::dims::{DimensionNormalizer, NormalizedIndex};
use crate::filing_day::{date_to_days, FilingDay};
use crate::io::IndexSource;
use crate::progress::{ParseProgress, ProgressEvent, ProgressReporter};
use crate::IngestResult;

/// Snapshot cadence, in processed data rows.
const REPORT_EVERY: u64 = 10_000;

/// One valid data row, with dimensions replaced by local ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilingRecord {
    pub cik: u64,
    pub form_type_id: u32,
    pub filed_date: FilingDay,
    pub accession_filer: u64,
    pub accession_sequence: u64,
    pub extension_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Stop after this many data rows ("test mode").
    pub row_limit: Option<u64>,
    /// Pass 1 total, only used for progress.
    pub total_rows: Option<u64>,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub index: NormalizedIndex,
    /// Data rows seen, valid or not.
    pub rows_processed: u64,
    /// Malformed rows dropped.
    pub skipped: u64,
    pub bytes_read: u64,
    /// The row limit stopped the read before end of file.
    pub truncated: bool,
}

/// Pass 2 over a fresh stream of `source`.
pub async fn parse_index(
    source: &IndexSource,
    options: &ParseOptions,
    reporter: &dyn ProgressReporter,
) -> IngestResult<ParseOutcome> {
    let lines = source.lines().await?;
    parse_lines(lines, options, reporter).await
}

/// Classify, split and normalize every data line of `lines`.
///
/// When the row limit is hit the stream is dropped on the spot: no further
/// bytes are read and the underlying reader is closed.
pub async fn parse_lines<S>(
    mut lines: S,
    options: &ParseOptions,
    reporter: &dyn ProgressReporter,
) -> IngestResult<ParseOutcome>
where
    S: Stream<Item = IngestResult<RawLine>> + Unpin,
{
    let mut classifier = LineClassifier::new();
    let mut dims = DimensionNormalizer::new();
    let mut filings = Vec::with_capacity(options.total_rows.unwrap_or(0).min(1 << 20) as usize);
    let mut rows_processed = 0u64;
    let mut skipped = 0u64;
    let mut bytes_read = 0u64;
    let mut truncated = false;

    while let Some(line) = lines.next().await {
        let line = line?;
        bytes_read = line.bytes_read;
        if classifier.classify(&line.text) != LineKind::Data {
            continue;
        }

        rows_processed += 1;
        match parse_row(&line.text, &mut dims) {
            Some(record) => filings.push(record),
            None => {
                skipped += 1;
                tracing::trace!(line = line.number, "skipping malformed row");
            }
        }

        if rows_processed % REPORT_EVERY == 0 {
            reporter.report(&ProgressEvent::Parsing(ParseProgress {
                rows_processed,
                records: filings.len() as u64,
                skipped,
                bytes_read,
                companies: dims.company_count(),
                form_types: dims.form_type_count(),
                extensions: dims.extension_count(),
                total_rows: options.total_rows,
            }));
        }

        if options.row_limit.is_some_and(|limit| rows_processed >= limit) {
            truncated = true;
            break;
        }
    }
    // Explicit stop-reading point for the row limit
    drop(lines);

    reporter.report(&ProgressEvent::Parsing(ParseProgress {
        rows_processed,
        records: filings.len() as u64,
        skipped,
        bytes_read,
        companies: dims.company_count(),
        form_types: dims.form_type_count(),
        extensions: dims.extension_count(),
        total_rows: options.total_rows,
    }));
    tracing::info!(
        rows = rows_processed,
        records = filings.len(),
        skipped,
        companies = dims.company_count(),
        form_types = dims.form_type_count(),
        extensions = dims.extension_count(),
        truncated,
        "index parsed"
    );

    Ok(ParseOutcome {
        index: dims.finish(filings),
        rows_processed,
        skipped,
        bytes_read,
        truncated,
    })
}

/// `None` means the row is malformed and dropped. Dimensions are only
/// registered once every field has validated.
fn parse_row(line: &str, dims: &mut DimensionNormalizer) -> Option<FilingRecord> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < 5 {
        return None;
    }

    let cik: u64 = fields[0].parse().ok()?;
    let name = fields[1].trim();
    let form_type = fields[2].trim();
    let filed_date = date_to_days(fields[3].trim())?;
    let accession = Accession::from_path(fields[4].trim())?;

    dims.intern_company(cik, name);
    let form_type_id = dims.intern_form_type(form_type);
    let extension_id = dims.intern_extension(&accession.extension);

    Some(FilingRecord {
        cik,
        form_type_id,
        filed_date,
        accession_filer: accession.filer,
        accession_sequence: accession.sequence,
        extension_id,
    })
}
