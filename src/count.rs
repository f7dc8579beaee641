use futures::{Stream, StreamExt};

use crate::classify::{LineClassifier, LineKind};
use crate::codec::RawLine;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::IngestResult;

const REPORT_EVERY: u64 = 100_000;

/// Pass 1: count data rows without keeping any line content.
///
/// Uses the same header/data predicate as [`crate::parse_lines`], so the total
/// equals the number of records pass 2 emits when no row is malformed.
pub async fn count_rows<S>(mut lines: S, reporter: &dyn ProgressReporter) -> IngestResult<u64>
where
    S: Stream<Item = IngestResult<RawLine>> + Unpin,
{
    let mut classifier = LineClassifier::new();
    let mut rows = 0u64;
    let mut bytes_read = 0u64;

    while let Some(line) = lines.next().await {
        let line = line?;
        bytes_read = line.bytes_read;
        if classifier.classify(&line.text) == LineKind::Data {
            rows += 1;
            if rows % REPORT_EVERY == 0 {
                reporter.report(&ProgressEvent::Counting { rows, bytes_read });
            }
        }
    }

    reporter.report(&ProgressEvent::Counting { rows, bytes_read });
    tracing::debug!(rows, bytes_read, "row count complete");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{lines_from_reader, SourceMeta};
    use crate::progress::NoProgress;

    #[tokio::test]
    async fn counts_only_data_rows() {
        let data: &'static [u8] = b"Description: Master Index\n\
            CIK|Company Name|Form Type|Date Filed|Filename\n\
            ---------------------------------\n\
            1|A|10-K|20240115|edgar/data/1/0000000001-24-000001.txt\n\
            2|B|8-K|20240115|edgar/data/2/0000000002-24-000002.txt\n\
            \n\
            3|C|4|20240115|edgar/data/3/badfile.txt\n";
        let rows = count_rows(lines_from_reader(data, &SourceMeta::default()), &NoProgress)
            .await
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[tokio::test]
    async fn empty_input_counts_zero() {
        let data: &'static [u8] = b"";
        let rows = count_rows(lines_from_reader(data, &SourceMeta::default()), &NoProgress)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }
}
