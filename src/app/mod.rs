pub mod ports;
pub mod ingest_use_case;
pub mod log_query_use_case;
pub mod payload_lookup_use_case;

pub use ingest_use_case::{IngestOutcome, WeatherIngestor};
pub use log_query_use_case::{LogQueryResult, LogQueryService};
pub use payload_lookup_use_case::PayloadLookupService;
