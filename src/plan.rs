//! Chunk layout for the upload: chunk 1 carries every form type and
//! extension, then company slices, then filing slices.

use std::ops::Range;

use crate::dims::{Company, NormalizedIndex};
use crate::parse::FilingRecord;
use crate::{IngestError, IngestResult};

/// Chunk sizes offered to the operator.
pub const CHUNK_SIZE_PRESETS: [usize; 5] = [1_000, 5_000, 10_000, 25_000, 50_000];

/// Preset chunk size scaled to the pass 1 row count.
pub fn recommended_chunk_size(total_rows: u64) -> usize {
    match total_rows {
        0..=49_999 => CHUNK_SIZE_PRESETS[0],
        50_000..=499_999 => CHUNK_SIZE_PRESETS[1],
        500_000..=1_999_999 => CHUNK_SIZE_PRESETS[2],
        2_000_000..=9_999_999 => CHUNK_SIZE_PRESETS[3],
        _ => CHUNK_SIZE_PRESETS[4],
    }
}

/// What a numbered chunk carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSpec {
    Dimensions,
    Companies(Range<usize>),
    Filings(Range<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunk_size: usize,
    pub company_count: usize,
    pub filing_count: usize,
    pub company_chunks: usize,
    pub filing_chunks: usize,
    pub total_chunks: usize,
}

impl ChunkPlan {
    pub fn new(chunk_size: usize, company_count: usize, filing_count: usize) -> IngestResult<Self> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkSize);
        }
        let company_chunks = company_count.div_ceil(chunk_size);
        let filing_chunks = filing_count.div_ceil(chunk_size);
        Ok(Self {
            chunk_size,
            company_count,
            filing_count,
            company_chunks,
            filing_chunks,
            total_chunks: 1 + company_chunks + filing_chunks,
        })
    }

    /// 1-based chunk lookup; `None` outside `1..=total_chunks`.
    pub fn chunk(&self, number: usize) -> Option<ChunkSpec> {
        if number == 0 || number > self.total_chunks {
            return None;
        }
        if number == 1 {
            return Some(ChunkSpec::Dimensions);
        }

        let offset = number - 2;
        if offset < self.company_chunks {
            return Some(ChunkSpec::Companies(
                self.slice(offset, self.company_count),
            ));
        }
        Some(ChunkSpec::Filings(
            self.slice(offset - self.company_chunks, self.filing_count),
        ))
    }

    fn slice(&self, index: usize, len: usize) -> Range<usize> {
        let start = index * self.chunk_size;
        start..(start + self.chunk_size).min(len)
    }

    pub fn first_filing_chunk(&self) -> usize {
        2 + self.company_chunks
    }
}

/// Parsed data plus its chunk layout. Read-only once built.
#[derive(Debug)]
pub struct PreparedUpload {
    index: NormalizedIndex,
    plan: ChunkPlan,
}

impl PreparedUpload {
    pub fn new(index: NormalizedIndex, chunk_size: usize) -> IngestResult<Self> {
        let plan = ChunkPlan::new(chunk_size, index.companies.len(), index.filings.len())?;
        tracing::info!(
            chunk_size,
            company_chunks = plan.company_chunks,
            filing_chunks = plan.filing_chunks,
            total_chunks = plan.total_chunks,
            "upload planned"
        );
        Ok(Self { index, plan })
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn index(&self) -> &NormalizedIndex {
        &self.index
    }

    pub fn companies(&self, range: Range<usize>) -> &[Company] {
        &self.index.companies[range]
    }

    pub fn filings(&self, range: Range<usize>) -> &[FilingRecord] {
        &self.index.filings[range]
    }
}
