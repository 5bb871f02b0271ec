//! In-process doubles for the three ports, used by tests and local demos.
//! Each one counts the calls it receives and can be told to fail.

use super::fresh_etag;
use crate::app::ports::{FetchResponse, HttpFetcher, LogStore, PayloadStore};
use crate::domain::{extension_for, LogEntity, LogRecord, Locator, StoredPayload};
use crate::error::{Result, WeatherError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

fn guard<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| WeatherError::StoreUnavailable("in-memory store lock poisoned".into()))
}

enum Reply {
    Respond(FetchResponse),
    Unreachable(String),
}

/// Fetcher that answers every request with the same canned reply.
pub struct StubFetcher {
    reply: Reply,
    urls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn responding(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::with_response(FetchResponse {
            status,
            body: body.into(),
            content_type: "application/json; charset=utf-8".to_string(),
        })
    }

    pub fn with_response(response: FetchResponse) -> Self {
        Self {
            reply: Reply::Respond(response),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            reply: Reply::Unreachable(reason.into()),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        guard(&self.urls)?.push(url.to_string());
        match &self.reply {
            Reply::Respond(resp) => Ok(resp.clone()),
            Reply::Unreachable(reason) => Err(WeatherError::Network(reason.clone())),
        }
    }
}

pub struct InMemoryPayloadStore {
    container: String,
    blobs: Mutex<HashMap<Locator, StoredPayload>>,
    fail_writes: bool,
    calls: AtomicUsize,
}

impl Default for InMemoryPayloadStore {
    fn default() -> Self {
        Self::new("weather-data")
    }
}

impl InMemoryPayloadStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blobs: Mutex::new(HashMap::new()),
            fail_writes: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A store whose every `save` fails as if the backing service were down.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, locator: &Locator) -> Option<StoredPayload> {
        self.blobs.lock().ok()?.remove(locator)
    }
}

#[async_trait]
impl PayloadStore for InMemoryPayloadStore {
    async fn save(&self, key: &str, content: &[u8], content_type: &str) -> Result<Locator> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(WeatherError::StoreUnavailable("payload store rejected write".into()));
        }
        let locator = Locator::new(
            self.container.clone(),
            format!("{}.{}", key, extension_for(content_type)),
        );
        guard(&self.blobs)?.insert(
            locator.clone(),
            StoredPayload {
                content: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        debug!(locator = %locator, bytes = content.len(), "stored payload in memory");
        Ok(locator)
    }

    async fn load(&self, locator: &Locator) -> Result<StoredPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        guard(&self.blobs)?
            .get(locator)
            .cloned()
            .ok_or_else(|| WeatherError::not_found(format!("Blob not found at path: {}", locator)))
    }
}

pub struct InMemoryLogStore {
    entities: Mutex<Vec<LogEntity>>,
    collection_exists: bool,
    available: bool,
    calls: AtomicUsize,
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
            collection_exists: true,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// A store whose log collection was never created.
    pub fn missing_collection() -> Self {
        Self {
            collection_exists: false,
            ..Self::new()
        }
    }

    /// A store whose backing service cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.entities
            .lock()
            .map(|e| e.iter().map(|x| x.record.clone()).collect())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(WeatherError::StoreUnavailable("log store unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, record: &LogRecord) -> Result<()> {
        self.check()?;
        let mut entities = guard(&self.entities)?;
        let duplicate = entities.iter().any(|e| {
            e.record.partition_key == record.partition_key && e.record.row_key == record.row_key
        });
        if !duplicate {
            entities.push(LogEntity {
                record: record.clone(),
                etag: fresh_etag(),
            });
        }
        Ok(())
    }

    async fn query_range(
        &self,
        partition_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntity>> {
        self.check()?;
        if !self.collection_exists {
            return Err(WeatherError::not_found("Weather logs table not found."));
        }
        let mut hits: Vec<LogEntity> = guard(&self.entities)?
            .iter()
            .filter(|e| {
                e.record.partition_key == partition_key
                    && e.record.timestamp >= from
                    && e.record.timestamp <= to
            })
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.record.timestamp);
        Ok(hits)
    }

    async fn get_by_key(&self, partition_key: &str, row_key: &str) -> Result<LogEntity> {
        self.check()?;
        guard(&self.entities)?
            .iter()
            .find(|e| e.record.partition_key == partition_key && e.record.row_key == row_key)
            .cloned()
            .ok_or_else(|| {
                WeatherError::not_found(format!("No weather log found with RowKey: {}", row_key))
            })
    }
}
