use edgar_ingest::{
    count_rows, date_to_days, parse_index, IndexSource, IngestError, NoProgress, ParseOptions,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const FORMS: [&str; 4] = ["10-K", "8-K", "4", "10-Q"];

fn write_index(path: &Path, rows: u64, bad_every: u64) -> anyhow::Result<()> {
    let mut f = File::create(path)?;
    writeln!(f, "Description:           Master Index of EDGAR Dissemination Feed")?;
    writeln!(f)?;
    writeln!(f, "CIK|Company Name|Form Type|Date Filed|Filename")?;
    writeln!(f, "{}", "-".repeat(80))?;
    for i in 0..rows {
        let cik = 1000 + i % 37;
        let form = FORMS[(i % 4) as usize];
        if bad_every > 0 && i % bad_every == 0 {
            writeln!(f, "{cik}|CO {cik}|{form}|20240115|edgar/data/{cik}/badfile.txt")?;
        } else {
            writeln!(
                f,
                "{cik}|CO {cik}|{form}|20240115|edgar/data/{cik}/{:010}-24-{:06}.txt",
                cik, i
            )?;
        }
    }
    Ok(())
}

fn gzip(src: &Path) -> anyhow::Result<PathBuf> {
    let gz_path = src.with_extension("idx.gz");
    let mut encoder = GzEncoder::new(File::create(&gz_path)?, Compression::default());
    encoder.write_all(&std::fs::read(src)?)?;
    encoder.finish()?;
    Ok(gz_path)
}

#[tokio::test]
async fn gzip_counts_and_parses_the_same_rows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("master.idx");
    write_index(&plain, 50_000, 0)?;
    let gz = gzip(&plain)?;

    let source = IndexSource::from_path(&gz);
    assert!(source.meta().is_gzip());

    let rows = count_rows(source.lines().await?, &NoProgress).await?;
    let outcome = parse_index(&source, &ParseOptions::default(), &NoProgress).await?;

    assert_eq!(rows, 50_000);
    assert_eq!(outcome.index.filings.len() as u64, rows);
    assert_eq!(outcome.index.companies.len(), 37);
    assert_eq!(outcome.index.form_types.len(), 4);
    assert_eq!(outcome.index.extensions.len(), 1);
    assert!(outcome
        .index
        .filings
        .iter()
        .all(|f| f.filed_date == date_to_days("20240115").unwrap()));
    assert_eq!(outcome.bytes_read, std::fs::metadata(&plain)?.len());
    Ok(())
}

#[tokio::test]
async fn parsing_twice_is_deterministic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("master.idx");
    write_index(&plain, 2_000, 7)?;
    let source = IndexSource::from_path(&plain);

    let first = parse_index(&source, &ParseOptions::default(), &NoProgress).await?;
    let second = parse_index(&source, &ParseOptions::default(), &NoProgress).await?;

    assert_eq!(first.index.filings, second.index.filings);
    assert_eq!(first.index.companies, second.index.companies);
    let forms = |o: &edgar_ingest::ParseOutcome| -> Vec<(u32, String)> {
        o.index
            .form_types
            .entries()
            .map(|(id, c)| (id, c.to_string()))
            .collect()
    };
    assert_eq!(forms(&first), forms(&second));
    Ok(())
}

#[tokio::test]
async fn bad_paths_drop_rows_but_count_keeps_them() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("master.idx");
    // rows 0, 10, 20, ... carry an unparsable path
    write_index(&plain, 100, 10)?;
    let source = IndexSource::from_path(&plain);

    let rows = count_rows(source.lines().await?, &NoProgress).await?;
    let outcome = parse_index(&source, &ParseOptions::default(), &NoProgress).await?;

    assert_eq!(rows, 100);
    assert_eq!(outcome.rows_processed, 100);
    assert_eq!(outcome.skipped, 10);
    assert_eq!(outcome.index.filings.len(), 90);
    Ok(())
}

#[tokio::test]
async fn row_limit_stops_reading_early() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("master.idx");
    write_index(&plain, 50_000, 0)?;
    let source = IndexSource::from_path(&plain);

    let options = ParseOptions {
        row_limit: Some(500),
        total_rows: None,
    };
    let outcome = parse_index(&source, &options, &NoProgress).await?;
    assert!(outcome.truncated);
    assert_eq!(outcome.index.filings.len(), 500);
    assert!(outcome.bytes_read < std::fs::metadata(&plain)?.len());
    Ok(())
}

#[tokio::test]
async fn truncated_gzip_is_a_decompression_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("master.idx");
    write_index(&plain, 20_000, 0)?;
    let gz = gzip(&plain)?;

    let bytes = std::fs::read(&gz)?;
    std::fs::write(&gz, &bytes[..bytes.len() / 2])?;

    let source = IndexSource::from_path(&gz);
    let err = count_rows(source.lines().await?, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Decompression(_)), "{err:?}");
    Ok(())
}
