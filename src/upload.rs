//! Chunked, resumable upload of a [`PreparedUpload`].
//!
//! The driver is the only writer of [`UploadState`]. Chunks go out strictly in
//! ascending order, one request in flight at a time. Chunk 1 returns the
//! server ids for every form type and extension; the resulting
//! [`IdRemapping`] is built once and then used to rewrite every filing chunk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::{BulkInsertApi, BulkInsertRequest, BulkInsertResponse, FilingRow};
use crate::dims::Dictionary;
use crate::plan::{ChunkSpec, PreparedUpload};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::{IngestError, IngestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

/// Rows acknowledged by the server so far, per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    pub form_types: u64,
    pub extensions: u64,
    pub companies: u64,
    pub filings: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport failure or non-success response.
    Server(String),
    /// Chunk 1 came back without ids for these codes (strict remapping only).
    Unmapped(Vec<String>),
    /// Stopped by user. Not an error: resume or reset.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub chunk: usize,
    pub kind: FailureKind,
}

impl UploadFailure {
    pub fn is_user_stop(&self) -> bool {
        self.kind == FailureKind::Stopped
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadState {
    pub status: UploadStatus,
    /// Next chunk to send; the failed chunk after a failure.
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub counts: UploadCounts,
    pub failure: Option<UploadFailure>,
}

impl UploadState {
    fn new(total_chunks: usize) -> Self {
        Self {
            status: UploadStatus::Pending,
            current_chunk: 1,
            total_chunks,
            counts: UploadCounts::default(),
            failure: None,
        }
    }
}

/// Local dimension id -> server id, built once from chunk 1's response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRemapping {
    form_types: HashMap<u32, i64>,
    extensions: HashMap<u32, i64>,
    missing_form_types: Vec<String>,
    missing_extensions: Vec<String>,
}

impl IdRemapping {
    pub fn from_response(
        form_types: &Dictionary,
        extensions: &Dictionary,
        response: &BulkInsertResponse,
    ) -> Self {
        let (form_types, missing_form_types) = map_dictionary(form_types, &response.form_type_map);
        let (extensions, missing_extensions) = map_dictionary(extensions, &response.extension_map);
        Self {
            form_types,
            extensions,
            missing_form_types,
            missing_extensions,
        }
    }

    /// Server id, or the local id unchanged when the server did not report one.
    pub fn form_type(&self, local: u32) -> i64 {
        self.form_types
            .get(&local)
            .copied()
            .unwrap_or(i64::from(local))
    }

    pub fn extension(&self, local: u32) -> i64 {
        self.extensions
            .get(&local)
            .copied()
            .unwrap_or(i64::from(local))
    }

    pub fn missing_form_types(&self) -> &[String] {
        &self.missing_form_types
    }

    pub fn missing_extensions(&self) -> &[String] {
        &self.missing_extensions
    }

    pub fn is_complete(&self) -> bool {
        self.missing_form_types.is_empty() && self.missing_extensions.is_empty()
    }
}

fn map_dictionary(
    dictionary: &Dictionary,
    server: &HashMap<String, i64>,
) -> (HashMap<u32, i64>, Vec<String>) {
    let mut mapped = HashMap::with_capacity(dictionary.len());
    let mut missing = Vec::new();
    for (local, code) in dictionary.entries() {
        match server.get(code) {
            Some(&id) => {
                mapped.insert(local, id);
            }
            None => missing.push(code.to_string()),
        }
    }
    (mapped, missing)
}

/// Cooperative stop signal, checked before each chunk. An in-flight request
/// always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Keep sending after each chunk; otherwise pause between chunks.
    pub auto: bool,
    /// Treat a code missing from chunk 1's id maps as a failure.
    pub strict_remap: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            auto: true,
            strict_remap: false,
        }
    }
}

pub struct UploadDriver<A> {
    api: A,
    prepared: PreparedUpload,
    options: UploadOptions,
    state: UploadState,
    remap: Option<IdRemapping>,
    cancel: CancelFlag,
    reporter: Box<dyn ProgressReporter>,
}

impl<A: BulkInsertApi> UploadDriver<A> {
    pub fn new(api: A, prepared: PreparedUpload, options: UploadOptions) -> Self {
        let state = UploadState::new(prepared.plan().total_chunks);
        Self {
            api,
            prepared,
            options,
            state,
            remap: None,
            cancel: CancelFlag::new(),
            reporter: Box::new(NoProgress),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn remapping(&self) -> Option<&IdRemapping> {
        self.remap.as_ref()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn set_auto(&mut self, auto: bool) {
        self.options.auto = auto;
    }

    pub async fn start(&mut self) -> IngestResult<&UploadState> {
        self.run_from(1).await
    }

    /// Continue at the recorded cursor (after a pause, failure or stop). A stop
    /// requested while paused is recorded before anything is sent.
    pub async fn resume(&mut self) -> IngestResult<&UploadState> {
        let chunk = self.state.current_chunk;
        self.run_from(chunk).await
    }

    /// Send chunks `start_chunk..=total` in order. Chunk failures are recorded
    /// in the returned state; `Err` is only returned for a start the driver
    /// cannot honour.
    pub async fn run_from(&mut self, start_chunk: usize) -> IngestResult<&UploadState> {
        let plan = *self.prepared.plan();
        let total = plan.total_chunks;

        if start_chunk == 0 || start_chunk > total {
            return Err(IngestError::InvalidStart {
                requested: start_chunk,
                reason: format!("valid chunks are 1..={}", total),
            });
        }
        if self.state.status == UploadStatus::Completed {
            return Err(IngestError::InvalidStart {
                requested: start_chunk,
                reason: "upload already completed".to_string(),
            });
        }
        if start_chunk > 1 && self.remap.is_none() && plan.filing_chunks > 0 {
            return Err(IngestError::MissingRemapping {
                chunk: start_chunk.max(plan.first_filing_chunk()),
            });
        }

        // A pending stop survives pauses; only resuming a recorded stop clears it
        let resuming_stop = self
            .state
            .failure
            .as_ref()
            .is_some_and(UploadFailure::is_user_stop);
        if resuming_stop {
            self.cancel.clear();
        }
        self.state.status = UploadStatus::Running;
        self.state.failure = None;
        self.state.current_chunk = start_chunk;
        tracing::info!(start_chunk, total_chunks = total, "upload running");

        let mut chunk = start_chunk;
        while chunk <= total {
            if self.cancel.is_cancelled() {
                tracing::warn!(chunk, "upload stopped by user");
                self.state.status = UploadStatus::Failed;
                self.state.failure = Some(UploadFailure {
                    chunk,
                    kind: FailureKind::Stopped,
                });
                return Ok(&self.state);
            }

            self.state.current_chunk = chunk;
            if let Err(kind) = self.send_chunk(chunk).await {
                tracing::error!(chunk, failure = ?kind, "chunk failed");
                self.state.status = UploadStatus::Failed;
                self.state.failure = Some(UploadFailure { chunk, kind });
                return Ok(&self.state);
            }

            self.reporter.report(&ProgressEvent::Uploading {
                chunk,
                total_chunks: total,
                counts: self.state.counts,
            });

            chunk += 1;
            if chunk <= total {
                self.state.current_chunk = chunk;
                if !self.options.auto {
                    tracing::info!(next_chunk = chunk, "upload paused");
                    self.state.status = UploadStatus::Paused;
                    return Ok(&self.state);
                }
            }
        }

        self.state.status = UploadStatus::Completed;
        self.state.current_chunk = total;
        tracing::info!(
            companies = self.state.counts.companies,
            filings = self.state.counts.filings,
            "upload completed"
        );
        Ok(&self.state)
    }

    async fn send_chunk(&mut self, chunk: usize) -> Result<(), FailureKind> {
        let spec = self
            .prepared
            .plan()
            .chunk(chunk)
            .ok_or_else(|| FailureKind::Server(format!("chunk {} is out of range", chunk)))?;

        match spec {
            ChunkSpec::Dimensions => {
                let index = self.prepared.index();
                let request = BulkInsertRequest {
                    form_types: index.form_types.codes().collect(),
                    extensions: index.extensions.codes().collect(),
                    ..Default::default()
                };
                let response = self.api.bulk_insert(&request).await.map_err(server)?;

                if self.remap.is_some() {
                    tracing::debug!("dimensions re-sent; keeping the existing id remapping");
                } else {
                    let remap =
                        IdRemapping::from_response(&index.form_types, &index.extensions, &response);
                    if !remap.is_complete() {
                        let mut missing = remap.missing_form_types().to_vec();
                        missing.extend_from_slice(remap.missing_extensions());
                        if self.options.strict_remap {
                            return Err(FailureKind::Unmapped(missing));
                        }
                        tracing::warn!(
                            codes = ?missing,
                            "server returned no id for some codes; their local ids pass through"
                        );
                    }
                    self.remap = Some(remap);
                }

                // Dimension inserts are idempotent; a re-send reports the same maps
                self.state.counts.form_types = response.form_type_map.len() as u64;
                self.state.counts.extensions = response.extension_map.len() as u64;
            }
            ChunkSpec::Companies(range) => {
                let companies = self.prepared.companies(range);
                let request = BulkInsertRequest {
                    companies,
                    ..Default::default()
                };
                let response = self.api.bulk_insert(&request).await.map_err(server)?;
                self.state.counts.companies +=
                    response.inserted.unwrap_or(companies.len() as u64);
            }
            ChunkSpec::Filings(range) => {
                let remap = self
                    .remap
                    .as_ref()
                    .ok_or_else(|| FailureKind::Server("no id remapping available".to_string()))?;
                let filings: Vec<FilingRow> = self
                    .prepared
                    .filings(range)
                    .iter()
                    .map(|f| FilingRow {
                        cik: f.cik,
                        form_type_id: remap.form_type(f.form_type_id),
                        filed_date: f.filed_date,
                        accession_filer: f.accession_filer,
                        accession_seq: f.accession_sequence,
                        ext_id: remap.extension(f.extension_id),
                    })
                    .collect();
                let sent = filings.len() as u64;
                let request = BulkInsertRequest {
                    filings,
                    ..Default::default()
                };
                let response = self.api.bulk_insert(&request).await.map_err(server)?;
                // Server count is authoritative (conflicting rows are not inserted)
                self.state.counts.filings += response.inserted.unwrap_or(sent);
            }
        }

        tracing::debug!(chunk, "chunk acknowledged");
        Ok(())
    }

    /// Cancel: drop cursor, counts and remapping. Nothing is undone server-side.
    pub fn reset(&mut self) {
        self.cancel.clear();
        self.state = UploadState::new(self.prepared.plan().total_chunks);
        self.remap = None;
        tracing::info!("upload reset");
    }
}

fn server(err: crate::api::ApiError) -> FailureKind {
    FailureKind::Server(err.to_string())
}
