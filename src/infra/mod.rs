pub mod http_client;
pub mod in_memory;
pub mod log_store;
pub mod payload_store;

pub use http_client::ReqwestHttp;
pub use in_memory::{InMemoryLogStore, InMemoryPayloadStore, StubFetcher};
pub use log_store::SqliteLogStore;
pub use payload_store::FsPayloadStore;

use uuid::Uuid;

/// Opaque concurrency token handed out by the log stores on append.
pub(crate) fn fresh_etag() -> String {
    format!("W/\"{}\"", Uuid::new_v4().simple())
}
