//! Remote bulk-insert, setup and stats endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;
use crate::dims::Company;
use crate::filing_day::FilingDay;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Filing as sent on the wire, with dimension ids already translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilingRow {
    pub cik: u64,
    pub form_type_id: i64,
    pub filed_date: FilingDay,
    pub accession_filer: u64,
    pub accession_seq: u64,
    pub ext_id: i64,
}

/// Body of one bulk-insert call. Unused collections are sent empty.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertRequest<'a> {
    pub form_types: Vec<&'a str>,
    pub extensions: Vec<&'a str>,
    pub companies: &'a [Company],
    pub filings: Vec<FilingRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertResponse {
    /// Server id per form type code (dimension call only).
    #[serde(default)]
    pub form_type_map: HashMap<String, i64>,
    #[serde(default)]
    pub extension_map: HashMap<String, i64>,
    /// Rows actually written, which may be less than the rows sent.
    #[serde(default)]
    pub inserted: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub ready: bool,
    #[serde(default)]
    pub missing_tables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    #[serde(default)]
    pub form_types: u64,
    #[serde(default)]
    pub extensions: u64,
    #[serde(default)]
    pub companies: u64,
    #[serde(default)]
    pub filings: u64,
}

/// The remote store as seen by the upload driver.
#[async_trait]
pub trait BulkInsertApi: Send + Sync {
    async fn bulk_insert(
        &self,
        request: &BulkInsertRequest<'_>,
    ) -> Result<BulkInsertResponse, ApiError>;

    async fn setup_status(&self) -> Result<TableStatus, ApiError>;

    async fn stats(&self) -> Result<TableStats, ApiError>;
}

/// `reqwest` implementation of [`BulkInsertApi`].
pub struct HttpBulkClient {
    http_client: reqwest::Client,
    config: ApiConfig,
    token: Option<String>,
}

impl HttpBulkClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        // No request timeout: a chunk may legitimately take minutes server-side
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;
        let token = config.resolve_token();
        Ok(Self {
            http_client,
            config,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::HttpStatus { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BulkInsertApi for HttpBulkClient {
    async fn bulk_insert(
        &self,
        request: &BulkInsertRequest<'_>,
    ) -> Result<BulkInsertResponse, ApiError> {
        let url = self.url(&self.config.bulk_insert_path);
        tracing::debug!(
            url = %url,
            form_types = request.form_types.len(),
            extensions = request.extensions.len(),
            companies = request.companies.len(),
            filings = request.filings.len(),
            "bulk insert"
        );
        let response = self
            .authorize(self.http_client.post(&url))
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn setup_status(&self) -> Result<TableStatus, ApiError> {
        let url = self.url(&self.config.setup_path);
        let response = self.authorize(self.http_client.get(&url)).send().await?;
        Self::read_json(response).await
    }

    async fn stats(&self) -> Result<TableStats, ApiError> {
        let url = self.url(&self.config.stats_path);
        let response = self.authorize(self.http_client.get(&url)).send().await?;
        Self::read_json(response).await
    }
}
