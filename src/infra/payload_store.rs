use crate::app::ports::PayloadStore;
use crate::domain::{extension_for, Locator, StoredPayload};
use crate::error::{Result, WeatherError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};
use uuid::Uuid;

/// Sidecar written next to each blob.
#[derive(Debug, Serialize, Deserialize)]
struct BlobMeta {
    content_type: String,
    size_bytes: u64,
    saved_at: DateTime<Utc>,
}

/// Blob store over a local directory: `<root>/<container>/<blob>`.
pub struct FsPayloadStore {
    root: PathBuf,
    container: String,
}

impl FsPayloadStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
        }
    }

    fn blob_path(&self, locator: &Locator) -> PathBuf {
        let mut path = self.root.join(locator.container());
        for seg in locator.blob().split('/') {
            path.push(seg);
        }
        path
    }

    fn meta_path(blob_path: &Path) -> PathBuf {
        let mut name = blob_path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}

/// Write to a temp file in the same directory, then rename over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp-{}", Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

fn content_type_for(blob: &str) -> &'static str {
    match blob.rsplit_once('.').map(|(_, ext)| ext) {
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("html") => "text/html",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl PayloadStore for FsPayloadStore {
    async fn save(&self, key: &str, content: &[u8], content_type: &str) -> Result<Locator> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(WeatherError::invalid(format!("invalid payload key: {key:?}")));
        }
        let locator = Locator::new(
            self.container.clone(),
            format!("{}.{}", key, extension_for(content_type)),
        );
        let path = self.blob_path(&locator);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = write_atomic(&path, content).await {
            error!(locator = %locator, error = %e, "Error saving to blob storage");
            return Err(WeatherError::StoreUnavailable(format!(
                "failed writing blob {}: {}",
                locator, e
            )));
        }
        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size_bytes: content.len() as u64,
            saved_at: Utc::now(),
        };
        write_atomic(&Self::meta_path(&path), &serde_json::to_vec(&meta)?)
            .await
            .map_err(|e| {
                WeatherError::StoreUnavailable(format!("failed writing blob metadata {}: {}", locator, e))
            })?;

        debug!(locator = %locator, bytes = content.len(), "payload written");
        Ok(locator)
    }

    async fn load(&self, locator: &Locator) -> Result<StoredPayload> {
        let path = self.blob_path(locator);
        let content = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WeatherError::not_found(format!(
                    "Blob not found at path: {}",
                    locator
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read(Self::meta_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<BlobMeta>(&raw)
                .map(|m| m.content_type)
                .unwrap_or_else(|_| content_type_for(locator.blob()).to_string()),
            Err(_) => content_type_for(locator.blob()).to_string(),
        };
        Ok(StoredPayload {
            content,
            content_type,
        })
    }
}
