use crate::app::ports::{LogStore, PayloadStore};
use crate::domain::{Locator, StoredPayload};
use crate::error::{Result, WeatherError};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const MISSING_ROW_KEY: &str = "Please provide a RowKey in the URL path (/payload/{RowKey})";
pub const INVALID_ROW_KEY: &str = "RowKey must be a valid GUID format";

/// Resolves a row key to its log record, then to the stored payload.
pub struct PayloadLookupService {
    logs: Arc<dyn LogStore>,
    payloads: Arc<dyn PayloadStore>,
    partition_key: String,
}

impl PayloadLookupService {
    pub fn new(
        logs: Arc<dyn LogStore>,
        payloads: Arc<dyn PayloadStore>,
        partition_key: impl Into<String>,
    ) -> Self {
        Self {
            logs,
            payloads,
            partition_key: partition_key.into(),
        }
    }

    pub async fn lookup(&self, id: Option<&str>) -> Result<StoredPayload> {
        let row_key = normalize_row_key(id)?;
        info!(row_key = %row_key, "Fetching weather payload");

        let entity = match self.logs.get_by_key(&self.partition_key, &row_key).await {
            Ok(entity) => entity,
            Err(WeatherError::NotFound(_)) => {
                return Err(WeatherError::not_found(format!(
                    "No weather log found with RowKey: {}",
                    row_key
                )))
            }
            Err(e) => {
                error!(row_key = %row_key, error = %e, "Failed to read weather log");
                return Err(e);
            }
        };

        let raw_locator = entity
            .record
            .payload_locator
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                WeatherError::not_found(format!(
                    "Weather log with RowKey {} has no associated blob reference",
                    row_key
                ))
            })?;
        let locator = Locator::parse(&raw_locator)?;

        match self.payloads.load(&locator).await {
            Ok(payload) => Ok(payload),
            Err(WeatherError::NotFound(_)) => Err(WeatherError::not_found(format!(
                "Blob not found at path: {}",
                locator
            ))),
            Err(e) => {
                error!(row_key = %row_key, locator = %locator, error = %e, "Failed to retrieve payload");
                Err(e)
            }
        }
    }
}

/// Row keys are stored as lowercase hyphenated UUIDs.
pub fn normalize_row_key(id: Option<&str>) -> Result<String> {
    let id = id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WeatherError::invalid(MISSING_ROW_KEY))?;
    Uuid::parse_str(id)
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| WeatherError::invalid(INVALID_ROW_KEY))
}
