use crate::codec::{IndexLineCodec, RawLine, DEFAULT_MAX_LINE_LENGTH};
use crate::{IngestError, IngestResult};
use async_compression::tokio::bufread::GzipDecoder;
use futures::stream::{BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::codec::FramedRead;

/// Lazy, finite, non-restartable sequence of index lines.
pub type LineStream = BoxStream<'static, IngestResult<RawLine>>;

#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// e.g. "application/gzip" or "text/plain"
    pub content_type: String,
    /// e.g. "gzip", or empty
    pub content_encoding: String,
    /// just the key/filename (used for extension fallback)
    pub name_hint: String,
    /// Which character encoding to expect (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
    pub max_line_length: usize,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            content_type: String::new(),
            content_encoding: String::new(),
            name_hint: String::new(),
            charset: encoding_rs::UTF_8,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl SourceMeta {
    /// Decompression choice: encoding -> type -> extension.
    pub fn is_gzip(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || self.name_hint.ends_with(".gz")
    }
}

/// From a generic AsyncRead, wrap with optional gzip decompression.
pub fn build_reader<R>(raw: R, meta: &SourceMeta) -> Box<dyn AsyncRead + Unpin + Send>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Use a larger buffer for fewer syscalls (1 MiB)
    let buf = BufReader::with_capacity(1 << 20, raw);
    if meta.is_gzip() {
        let mut decoder = GzipDecoder::new(buf);
        // Concatenated gzip members are legal and show up in mirrored index files
        decoder.multiple_members(true);
        Box::new(decoder)
    } else {
        Box::new(buf)
    }
}

/// Decode and split `raw` into lines. I/O failures of a gzip source surface as
/// [`IngestError::Decompression`].
pub fn lines_from_reader<R>(raw: R, meta: &SourceMeta) -> LineStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let compressed = meta.is_gzip();
    let reader = build_reader(raw, meta);
    let codec = IndexLineCodec::with_max_length(meta.charset, meta.max_line_length);
    FramedRead::new(reader, codec)
        .map(move |item| match item {
            Err(IngestError::Io(e)) if compressed => Err(IngestError::Decompression(e)),
            other => other,
        })
        .boxed()
}

fn meta_for_path(path: &Path) -> SourceMeta {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let mut meta = SourceMeta {
        name_hint: name,
        ..Default::default()
    };
    match path.extension().and_then(|s| s.to_str()).unwrap_or_default() {
        "gz" => {
            meta.content_type = "application/gzip".into();
            meta.content_encoding = "gzip".into();
        }
        _ => {
            meta.content_type = "text/plain".into();
        }
    }
    meta
}

/// A re-openable index file. Every call to [`IndexSource::lines`] starts a
/// fresh decoder from byte zero, so the counting and parsing passes never
/// share a cursor.
#[derive(Debug, Clone)]
pub struct IndexSource {
    path: PathBuf,
    meta: SourceMeta,
}

impl IndexSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let meta = meta_for_path(&path);
        Self { path, meta }
    }

    pub fn with_charset(mut self, charset: &'static encoding_rs::Encoding) -> Self {
        self.meta.charset = charset;
        self
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.meta.max_line_length = max;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    pub async fn lines(&self) -> IngestResult<LineStream> {
        let file = File::open(&self.path).await?;
        tracing::debug!(
            path = %self.path.display(),
            gzip = self.meta.is_gzip(),
            "opened index source"
        );
        Ok(lines_from_reader(file, &self.meta))
    }
}
