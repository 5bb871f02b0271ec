//! Trigger-side wiring: build the production components from `Config` and
//! run ingestion once or on an interval.

use crate::app::ports::{LogStore, PayloadStore};
use crate::app::{IngestOutcome, WeatherIngestor};
use crate::config::Config;
use crate::error::Result;
use crate::infra::{FsPayloadStore, ReqwestHttp, SqliteLogStore};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

#[derive(Clone)]
pub struct Stores {
    pub logs: Arc<dyn LogStore>,
    pub payloads: Arc<dyn PayloadStore>,
}

impl Stores {
    pub fn open(config: &Config) -> Result<Self> {
        let logs = SqliteLogStore::open(config.storage.log_db_path())?;
        let payloads = FsPayloadStore::new(config.storage.blob_root(), config.storage.container.clone());
        Ok(Self {
            logs: Arc::new(logs),
            payloads: Arc::new(payloads),
        })
    }
}

pub fn build_ingestor(config: &Config, stores: &Stores) -> Result<WeatherIngestor> {
    let http = ReqwestHttp::new(config.upstream_timeout())?;
    Ok(WeatherIngestor::new(
        Arc::new(http),
        stores.payloads.clone(),
        stores.logs.clone(),
        config.weather.endpoint.clone(),
    ))
}

/// One scheduled invocation. Missing credentials are logged and the run is
/// skipped without an error; every other failure is returned.
pub async fn ingest_once(config: &Config, ingestor: &WeatherIngestor) -> Result<Option<IngestOutcome>> {
    let Some(api_key) = config.api_key() else {
        error!("OpenWeatherMap API key is missing in configuration");
        return Ok(None);
    };
    let outcome = ingestor
        .ingest_once(&config.weather.location, api_key)
        .await?;
    Ok(Some(outcome))
}

/// Runs `ingest_once` every `schedule.interval_secs` forever. Failed runs are
/// logged and the next tick proceeds normally.
pub async fn run_schedule(config: Config, ingestor: Arc<WeatherIngestor>) {
    let mut ticker = interval(config.schedule_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        every_secs = config.schedule.interval_secs,
        location = %config.weather.location,
        "ingestion schedule started"
    );
    loop {
        ticker.tick().await;
        if let Err(e) = ingest_once(&config, &ingestor).await {
            error!(error = %e, "scheduled ingestion failed");
        }
    }
}
