use serde::Deserialize;
use std::path::Path;

use crate::codec::DEFAULT_MAX_LINE_LENGTH;
use crate::{IngestError, IngestResult};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngestConfig {
    pub api: ApiConfig,
    pub parse: ParseConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token used as-is.
    pub token: Option<String>,
    /// Environment variable holding the bearer token, read when `token` is unset.
    pub token_env: Option<String>,
    pub bulk_insert_path: String,
    pub setup_path: String,
    pub stats_path: String,
    /// The pipeline imposes no request timeout; only connecting is bounded.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/edgar".to_string(),
            token: None,
            token_env: Some("EDGAR_API_TOKEN".to_string()),
            bulk_insert_path: "/bulk-insert".to_string(),
            setup_path: "/setup".to_string(),
            stats_path: "/stats".to_string(),
            connect_timeout_secs: Some(30),
        }
    }
}

impl ApiConfig {
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = &self.token {
            return Some(token.clone());
        }
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ParseConfig {
    pub row_limit: Option<u64>,
    pub charset: String,
    pub max_line_length: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            row_limit: None,
            charset: "utf-8".to_string(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ParseConfig {
    pub fn encoding(&self) -> IngestResult<&'static encoding_rs::Encoding> {
        encoding_rs::Encoding::for_label(self.charset.trim().as_bytes())
            .ok_or_else(|| IngestError::UnknownCharset(self.charset.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    /// Fixed chunk size; a preset scaled to the row count when unset.
    pub chunk_size: Option<usize>,
    /// Send every chunk without pausing in between.
    pub auto: bool,
    /// Fail chunk 1 when the server omits an id for a local code.
    pub strict_remap: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            auto: true,
            strict_remap: false,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> IngestResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(IngestError::Config("api.base_url must not be empty".into()));
        }
        if self.upload.chunk_size == Some(0) {
            return Err(IngestError::Config("upload.chunk_size must be > 0".into()));
        }
        if self.parse.row_limit == Some(0) {
            return Err(IngestError::Config("parse.row_limit must be > 0".into()));
        }
        if self.parse.max_line_length == 0 {
            return Err(IngestError::Config("parse.max_line_length must be > 0".into()));
        }
        self.parse.encoding()?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> IngestResult<IngestConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        IngestError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: IngestConfig = toml::from_str(&content)
        .map_err(|e| IngestError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}
