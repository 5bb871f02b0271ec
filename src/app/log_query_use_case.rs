use crate::app::ports::LogStore;
use crate::domain::LogEntryView;
use crate::error::{Result, WeatherError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

pub const MISSING_RANGE: &str = "Both 'from' and 'to' date parameters are required (YYYY-MM-DD).";
pub const INVALID_DATE: &str = "Invalid date format. Use ISO 8601 format (e.g., 2025-03-01).";
pub const INVERTED_RANGE: &str = "'from' date cannot be after 'to' date.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryResult {
    pub city: String,
    pub count: usize,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub logs: Vec<LogEntryView>,
}

/// Range reads over one partition of the ingest log.
pub struct LogQueryService {
    logs: Arc<dyn LogStore>,
    partition_key: String,
}

impl LogQueryService {
    pub fn new(logs: Arc<dyn LogStore>, partition_key: impl Into<String>) -> Self {
        Self {
            logs,
            partition_key: partition_key.into(),
        }
    }

    /// Validates the raw bounds before the store is touched.
    pub async fn query(&self, from: Option<&str>, to: Option<&str>) -> Result<LogQueryResult> {
        let (from, to) = parse_range(from, to)?;
        info!(city = %self.partition_key, %from, %to, "querying weather logs");

        let entities = match self.logs.query_range(&self.partition_key, from, to).await {
            Ok(entities) => entities,
            Err(WeatherError::NotFound(_)) => {
                return Err(WeatherError::not_found("Weather logs table not found."))
            }
            Err(e) => {
                error!(city = %self.partition_key, %from, %to, error = %e, "Error retrieving logs");
                return Err(e);
            }
        };

        let mut logs: Vec<LogEntryView> = entities.into_iter().map(LogEntryView::from).collect();
        logs.sort_by_key(|l| l.timestamp);

        Ok(LogQueryResult {
            city: self.partition_key.clone(),
            count: logs.len(),
            from_date: from,
            to_date: to,
            logs,
        })
    }
}

pub fn parse_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (Some(from), Some(to)) = (present(from), present(to)) else {
        return Err(WeatherError::invalid(MISSING_RANGE));
    };
    let (Some(from), Some(to)) = (parse_timestamp(from), parse_timestamp(to)) else {
        return Err(WeatherError::invalid(INVALID_DATE));
    };
    if from > to {
        return Err(WeatherError::invalid(INVERTED_RANGE));
    }
    Ok((from, to))
}

fn present(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts RFC 3339, a naive date-time (read as UTC) or a bare date
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // '+' in an unencoded query string arrives as a space
    if let Some(idx) = raw.rfind(' ') {
        let repaired = format!("{}+{}", &raw[..idx], &raw[idx + 1..]);
        if let Ok(dt) = DateTime::parse_from_rfc3339(&repaired) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IngestStatus, LogRecord};
    use crate::infra::in_memory::InMemoryLogStore;
    use chrono::TimeZone;

    fn record(row_key: &str, partition: &str, ts: DateTime<Utc>) -> LogRecord {
        LogRecord {
            partition_key: partition.to_string(),
            row_key: row_key.to_string(),
            timestamp: ts,
            status: IngestStatus::Success,
            status_code: Some(200),
            payload_locator: Some(format!("weather-data/{}.json", row_key)),
        }
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let midnight = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01T01:00:00+01:00"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01T01:00:00 01:00"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01 01:00:00 01:00"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2025-03-01 00:00:00.000"), Some(midnight));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-01"), None);
    }

    #[test]
    fn test_parse_range_messages() {
        let err = parse_range(None, Some("2025-03-01")).unwrap_err();
        assert_eq!(err.to_string(), MISSING_RANGE);

        let err = parse_range(Some(""), Some("2025-03-01")).unwrap_err();
        assert_eq!(err.to_string(), MISSING_RANGE);

        let err = parse_range(Some("soon"), Some("2025-03-01")).unwrap_err();
        assert_eq!(err.to_string(), INVALID_DATE);

        let err = parse_range(Some("2025-03-02"), Some("2025-03-01")).unwrap_err();
        assert_eq!(err.to_string(), INVERTED_RANGE);

        assert!(parse_range(Some("2025-03-01"), Some("2025-03-01")).is_ok());
        assert!(parse_range(Some("  2025-03-01 "), Some("2025-03-02\n")).is_ok());
    }

    #[tokio::test]
    async fn test_inverted_range_never_touches_store() {
        let store = Arc::new(InMemoryLogStore::new());
        let service = LogQueryService::new(store.clone(), "London");

        let err = service
            .query(Some("2025-03-02"), Some("2025-03-01"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::InvalidInput(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_filters_partition_and_range_sorted() {
        let store = Arc::new(InMemoryLogStore::new());
        let day = |d, h| Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap();
        store.append(&record("late", "London", day(1, 18))).await.unwrap();
        store.append(&record("early", "London", day(1, 6))).await.unwrap();
        store.append(&record("paris", "Paris", day(1, 9))).await.unwrap();
        store.append(&record("outside", "London", day(3, 9))).await.unwrap();

        let service = LogQueryService::new(store, "London");
        let result = service
            .query(Some("2025-03-01"), Some("2025-03-02"))
            .await
            .unwrap();

        assert_eq!(result.city, "London");
        assert_eq!(result.count, 2);
        let keys: Vec<_> = result.logs.iter().map(|l| l.row_key.as_str()).collect();
        assert_eq!(keys, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_empty_range_is_not_an_error() {
        let service = LogQueryService::new(Arc::new(InMemoryLogStore::new()), "London");
        let result = service
            .query(Some("2025-03-01"), Some("2025-03-02"))
            .await
            .unwrap();
        assert_eq!(result.count, 0);
        assert!(result.logs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let service =
            LogQueryService::new(Arc::new(InMemoryLogStore::missing_collection()), "London");
        let err = service
            .query(Some("2025-03-01"), Some("2025-03-02"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Weather logs table not found.");
    }

    #[tokio::test]
    async fn test_store_outage_is_propagated() {
        let service = LogQueryService::new(Arc::new(InMemoryLogStore::unavailable()), "London");
        let err = service
            .query(Some("2025-03-01"), Some("2025-03-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::StoreUnavailable(_)));
    }
}
