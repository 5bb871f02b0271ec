use crate::app::ports::{HttpFetcher, LogStore, PayloadStore};
use crate::domain::{IngestStatus, LogRecord, Locator};
use crate::error::{Result, WeatherError};
use crate::observability::metrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What a completed ingestion run wrote.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub row_key: String,
    pub payload_locator: Locator,
    pub status: IngestStatus,
    pub status_code: u16,
}

/// Fetch, persist the raw body, then index it. One run writes at most one
/// payload and one log record, in that order.
pub struct WeatherIngestor {
    http: Arc<dyn HttpFetcher>,
    payloads: Arc<dyn PayloadStore>,
    logs: Arc<dyn LogStore>,
    endpoint: String,
}

impl WeatherIngestor {
    pub fn new(
        http: Arc<dyn HttpFetcher>,
        payloads: Arc<dyn PayloadStore>,
        logs: Arc<dyn LogStore>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            payloads,
            logs,
            endpoint: endpoint.into(),
        }
    }

    pub fn upstream_url(&self, location: &str, api_key: &str) -> Result<String> {
        reqwest::Url::parse_with_params(&self.endpoint, &[("q", location), ("appid", api_key)])
            .map(|u| u.to_string())
            .map_err(|e| {
                WeatherError::Config(format!("invalid weather endpoint '{}': {}", self.endpoint, e))
            })
    }

    /// Runs one ingestion. Errors are logged here and then returned so the
    /// trigger can apply its own retry policy; nothing is retried in-process.
    pub async fn ingest_once(&self, location: &str, api_key: &str) -> Result<IngestOutcome> {
        let started = Instant::now();
        let url = self.upstream_url(location, api_key)?;

        info!(location, url = %redact_key(&url), "fetching weather data");
        let resp = match self.http.fetch(&url).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(location, error = %e, "weather fetch failed, nothing written");
                metrics::ingest::run_error("fetch");
                return Err(e);
            }
        };

        let row_key = Uuid::new_v4().to_string();

        let locator = match self
            .payloads
            .save(&row_key, &resp.body, &resp.content_type)
            .await
        {
            Ok(locator) => locator,
            Err(e) => {
                error!(location, row_key = %row_key, error = %e, "saving payload failed, no log record written");
                metrics::ingest::run_error("payload_save");
                return Err(e);
            }
        };
        metrics::ingest::payload_bytes(resp.body.len());

        let status = IngestStatus::from_status_code(resp.status);
        let record = LogRecord {
            partition_key: location.to_string(),
            row_key: row_key.clone(),
            timestamp: Utc::now(),
            status,
            status_code: Some(resp.status),
            payload_locator: Some(locator.to_string()),
        };

        if let Err(e) = self.logs.append(&record).await {
            // The payload stays behind without an index entry.
            error!(
                location,
                row_key = %row_key,
                locator = %locator,
                error = %e,
                "appending log record failed, payload is orphaned"
            );
            metrics::ingest::run_error("log_append");
            return Err(e);
        }

        metrics::ingest::duration(started.elapsed().as_secs_f64());
        match status {
            IngestStatus::Success => {
                metrics::ingest::run_success();
                info!(
                    location,
                    row_key = %row_key,
                    status_code = resp.status,
                    locator = %locator,
                    "Successfully saved weather data"
                );
            }
            IngestStatus::Failed => {
                metrics::ingest::run_upstream_failed();
                warn!(
                    location,
                    row_key = %row_key,
                    status_code = resp.status,
                    locator = %locator,
                    "upstream answered with an error status; payload kept"
                );
            }
        }

        Ok(IngestOutcome {
            row_key,
            payload_locator: locator,
            status,
            status_code: resp.status,
        })
    }
}

/// `url` with the `appid` query value masked, for logging.
fn redact_key(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return "<unparseable url>".to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
