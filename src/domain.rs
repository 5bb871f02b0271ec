//! Data shapes shared by the use cases, the stores and the HTTP layer.

use crate::error::{Result, WeatherError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the upstream call as recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestStatus {
    Success,
    Failed,
}

impl IngestStatus {
    /// Any 2xx upstream code counts as success.
    pub fn from_status_code(code: u16) -> Self {
        if (200..=299).contains(&code) {
            IngestStatus::Success
        } else {
            IngestStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Success => "Success",
            IngestStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Success" => Some(IngestStatus::Success),
            "Failed" => Some(IngestStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry per ingestion attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub status: IngestStatus,
    pub status_code: Option<u16>,
    pub payload_locator: Option<String>,
}

/// A log record as held by the store, including its concurrency token.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntity {
    pub record: LogRecord,
    pub etag: String,
}

/// Client-facing projection of a log record with store metadata stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryView {
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub status: IngestStatus,
    pub status_code: Option<u16>,
    pub payload_locator: Option<String>,
}

impl From<LogEntity> for LogEntryView {
    fn from(entity: LogEntity) -> Self {
        let r = entity.record;
        Self {
            row_key: r.row_key,
            timestamp: r.timestamp,
            status: r.status,
            status_code: r.status_code,
            payload_locator: r.payload_locator,
        }
    }
}

/// Address of a stored payload: `<container>/<blob name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    container: String,
    blob: String,
}

impl Locator {
    pub fn new(container: impl Into<String>, blob: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blob: blob.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || WeatherError::invalid(format!("Invalid BlobPath format: {}", raw));
        let (container, blob) = raw
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(invalid)?;
        if blob.is_empty() || container.contains('\\') || matches!(container, "" | "." | "..") {
            return Err(invalid());
        }
        if blob
            .split(|c| c == '/' || c == '\\')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(invalid());
        }
        Ok(Self::new(container, blob))
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn blob(&self) -> &str {
        &self.blob
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.blob)
    }
}

/// Raw payload bytes plus the content type they arrived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Blob file extension for a content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if base.ends_with("json") {
        "json"
    } else if base.ends_with("xml") {
        "xml"
    } else if base == "text/html" {
        "html"
    } else if base.starts_with("text/") {
        "txt"
    } else {
        "bin"
    }
}
