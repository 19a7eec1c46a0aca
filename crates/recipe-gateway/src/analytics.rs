//! Best-effort request logging to an external row store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use recipe_common::GenerationLogRecord;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::Config;
use crate::report::LogRow;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Analytics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analytics store error: {status} - {body}")]
    Store { status: u16, body: String },

    #[error("Analytics store is not configured")]
    NotConfigured,
}

/// Persistence for generation log records
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn insert(&self, record: &GenerationLogRecord) -> Result<(), AnalyticsError>;

    /// Rows at or after `since`, newest first
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LogRow>, AnalyticsError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// PostgREST-style row store (Supabase)
pub struct RowStoreClient {
    base_url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl RowStoreClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: table.into(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AnalyticsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AnalyticsError::Store {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AnalyticsStore for RowStoreClient {
    async fn insert(&self, record: &GenerationLogRecord) -> Result<(), AnalyticsError> {
        let url = self.table_url();
        debug!("Inserting {} record into {}", record.request_type, url);

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check_status(response).await?;

        Ok(())
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LogRow>, AnalyticsError> {
        let url = self.table_url();
        let filter = format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true));

        debug!("Fetching analytics rows from {} since {}", url, since);

        let response = self
            .authorized(self.client.get(&url))
            .query(&[
                ("select", "*"),
                ("timestamp", filter.as_str()),
                ("order", "timestamp.desc"),
            ])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(response.json().await?)
    }
}

/// Store used when analytics is not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

#[async_trait]
impl AnalyticsStore for DisabledStore {
    async fn insert(&self, record: &GenerationLogRecord) -> Result<(), AnalyticsError> {
        debug!(
            "Analytics disabled, dropping {} record (success: {})",
            record.request_type, record.success
        );
        Ok(())
    }

    async fn fetch_since(&self, _since: DateTime<Utc>) -> Result<Vec<LogRow>, AnalyticsError> {
        Err(AnalyticsError::NotConfigured)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Pick the store for a configuration
pub fn store_from_config(config: &Config) -> Arc<dyn AnalyticsStore> {
    match (&config.supabase_url, &config.supabase_key) {
        (Some(url), Some(key)) => Arc::new(RowStoreClient::new(url, key, &config.analytics_table)),
        _ => Arc::new(DisabledStore),
    }
}

/// Fire-and-forget writer in front of an [`AnalyticsStore`]
#[derive(Clone)]
pub struct AnalyticsLogger {
    store: Arc<dyn AnalyticsStore>,
}

impl AnalyticsLogger {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Write `record` in the background
    ///
    /// Failures are logged and go no further. Callers may drop the handle;
    /// tests await it.
    pub fn record(&self, record: GenerationLogRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            match store.insert(&record).await {
                Ok(()) => debug!(
                    "Logged {} request for {}",
                    record.request_type, record.client_id
                ),
                Err(e) => error!(
                    "Failed to log {} request for {}: {}",
                    record.request_type, record.client_id, e
                ),
            }
        })
    }
}
