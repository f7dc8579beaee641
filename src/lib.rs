//! Streaming ingestion of SEC EDGAR master index files.
//!
//! - Decoding: local files, plain or gzip, read incrementally.
//! - Two cold passes: [`count_rows`] sizes the work, [`parse_index`] builds
//!   the normalized dataset.
//! - Upload: [`ChunkPlan`] lays out the chunks, [`UploadDriver`] sends them in
//!   order with pause, resume and cooperative cancellation.
//!
//! Data shape:
//! - `NormalizedIndex { form_types, extensions, companies, filings }`
//! - Filing rows reference dimensions by dense local id (1-based).
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod accession;
mod api;
mod classify;
mod codec;
mod config;
mod count;
mod dims;
mod filing_day;
mod io;
pub mod logging;
mod parse;
mod plan;
mod progress;
mod upload;

pub use crate::accession::Accession;
pub use crate::api::{
    ApiError, BulkInsertApi, BulkInsertRequest, BulkInsertResponse, FilingRow, HttpBulkClient,
    TableStats, TableStatus,
};
pub use crate::classify::{is_data_line, LineClassifier, LineKind};
pub use crate::codec::{IndexLineCodec, RawLine, DEFAULT_MAX_LINE_LENGTH};
pub use crate::config::{load_config, ApiConfig, IngestConfig, ParseConfig, UploadConfig};
pub use crate::count::count_rows;
pub use crate::dims::{Company, Dictionary, DimensionNormalizer, NormalizedIndex};
pub use crate::filing_day::{date_to_days, days_to_date, FilingDay};
pub use crate::io::{lines_from_reader, IndexSource, LineStream, SourceMeta};
pub use crate::parse::{parse_index, parse_lines, FilingRecord, ParseOptions, ParseOutcome};
pub use crate::plan::{
    recommended_chunk_size, ChunkPlan, ChunkSpec, PreparedUpload, CHUNK_SIZE_PRESETS,
};
pub use crate::progress::{
    JsonProgress, NoProgress, ParseProgress, ProgressEvent, ProgressMode, ProgressReporter,
    StderrProgress,
};
pub use crate::upload::{
    CancelFlag, FailureKind, IdRemapping, UploadCounts, UploadDriver, UploadFailure,
    UploadOptions, UploadState, UploadStatus,
};

use thiserror::Error;

/// Error type returned by this crate when not using `anyhow`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Corrupt or truncated gzip input.
    #[error("decompression failed: {0}")]
    Decompression(std::io::Error),
    #[error("line {line} exceeds the maximum length of {max} bytes")]
    LineTooLong { line: u64, max: usize },
    #[error("unknown charset label: {0}")]
    UnknownCharset(String),
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
    #[error("cannot start upload at chunk {requested}: {reason}")]
    InvalidStart { requested: usize, reason: String },
    /// A filing chunk was requested before chunk 1 was acknowledged in this run.
    #[error("chunk {chunk} needs server dimension ids, but chunk 1 has not been acknowledged")]
    MissingRemapping { chunk: usize },
    #[error("config error: {0}")]
    Config(String),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
