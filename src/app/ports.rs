use crate::domain::{LogEntity, LogRecord, Locator, StoredPayload};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Single network GET. Non-2xx answers are ordinary results; only transport
/// or body-read failures become `WeatherError::Network`.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Writes `content` under `key` and returns where it landed. Saving the
    /// same key twice overwrites.
    async fn save(&self, key: &str, content: &[u8], content_type: &str) -> Result<Locator>;

    /// Fails with `NotFound` when nothing is stored at `locator`.
    async fn load(&self, locator: &Locator) -> Result<StoredPayload>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Appends an immutable record. A duplicate row key is not an error.
    async fn append(&self, record: &LogRecord) -> Result<()>;

    /// Records in `partition_key` with `from <= timestamp <= to`, oldest
    /// first. `NotFound` means the collection itself is missing.
    async fn query_range(
        &self,
        partition_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntity>>;

    async fn get_by_key(&self, partition_key: &str, row_key: &str) -> Result<LogEntity>;
}
